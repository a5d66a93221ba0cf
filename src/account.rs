//! The slice of account/session state the relier protocol reads.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Fields that must all be present before a `LOGIN` is sent. `verified` is
/// not among them; it defaults to `false`.
pub const REQUIRED_LOGIN_FIELDS: [&str; 5] =
    ["email", "keyFetchToken", "sessionToken", "uid", "unwrapBKey"];

#[derive(Debug, Clone, Default)]
pub struct AccountSnapshot {
    pub email: Option<String>,
    pub uid: Option<String>,
    pub session_token: Option<SecretString>,
    pub session_token_context: Option<String>,
    pub key_fetch_token: Option<SecretString>,
    pub unwrap_b_key: Option<SecretString>,
    pub verified: Option<bool>,
    pub customize_sync: Option<bool>,
    pub declined_sync_engines: Option<Vec<String>>,
}

impl AccountSnapshot {
    #[must_use]
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn has_session_token(&self) -> bool {
        self.session_token.is_some()
    }

    /// Names of the required login fields missing from this snapshot.
    #[must_use]
    pub fn missing_login_fields(&self) -> Vec<&'static str> {
        let present = [
            self.email.is_some(),
            self.key_fetch_token.is_some(),
            self.session_token.is_some(),
            self.uid.is_some(),
            self.unwrap_b_key.is_some(),
        ];
        REQUIRED_LOGIN_FIELDS
            .iter()
            .zip(present)
            .filter_map(|(name, present)| (!present).then_some(*name))
            .collect()
    }

    /// Remove a field by its wire name. Unknown names are ignored.
    pub fn unset(&mut self, field: &str) {
        match field {
            "email" => self.email = None,
            "uid" => self.uid = None,
            "sessionToken" => self.session_token = None,
            "sessionTokenContext" => self.session_token_context = None,
            "keyFetchToken" => self.key_fetch_token = None,
            "unwrapBKey" => self.unwrap_b_key = None,
            "verified" => self.verified = None,
            "customizeSync" => self.customize_sync = None,
            "declinedSyncEngines" => self.declined_sync_engines = None,
            _ => {}
        }
    }
}

/// Plain serde form of an account, as stored on disk or read from a host.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub email: Option<String>,
    pub uid: Option<String>,
    pub session_token: Option<String>,
    pub session_token_context: Option<String>,
    pub key_fetch_token: Option<String>,
    pub unwrap_b_key: Option<String>,
    pub verified: Option<bool>,
    pub customize_sync: Option<bool>,
    pub declined_sync_engines: Option<Vec<String>>,
}

impl From<AccountRecord> for AccountSnapshot {
    fn from(record: AccountRecord) -> Self {
        Self {
            email: record.email,
            uid: record.uid,
            session_token: record.session_token.map(SecretString::from),
            session_token_context: record.session_token_context,
            key_fetch_token: record.key_fetch_token.map(SecretString::from),
            unwrap_b_key: record.unwrap_b_key.map(SecretString::from),
            verified: record.verified,
            customize_sync: record.customize_sync,
            declined_sync_engines: record.declined_sync_engines,
        }
    }
}

/// Body of `LOGIN` and `CHANGE_PASSWORD`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload<'a> {
    pub email: &'a str,
    pub uid: &'a str,
    pub session_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token_context: Option<&'a str>,
    pub key_fetch_token: &'a str,
    pub unwrap_b_key: &'a str,
    pub verified: bool,
    pub verified_can_link_account: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customize_sync: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declined_sync_engines: Option<&'a [String]>,
}

impl<'a> LoginPayload<'a> {
    /// `None` when any required login field is absent.
    #[must_use]
    pub fn from_account(
        account: &'a AccountSnapshot,
        verified_can_link_account: bool,
    ) -> Option<Self> {
        Some(Self {
            email: account.email.as_deref()?,
            uid: account.uid.as_deref()?,
            session_token: account.session_token.as_ref()?.expose_secret(),
            session_token_context: account.session_token_context.as_deref(),
            key_fetch_token: account.key_fetch_token.as_ref()?.expose_secret(),
            unwrap_b_key: account.unwrap_b_key.as_ref()?.expose_secret(),
            verified: account.verified.unwrap_or(false),
            verified_can_link_account,
            customize_sync: account.customize_sync,
            declined_sync_engines: account.declined_sync_engines.as_deref(),
        })
    }
}

/// Body of `DELETE_ACCOUNT` and `LOGOUT`.
#[derive(Debug, Serialize)]
pub struct IdentityPayload<'a> {
    pub email: &'a str,
    pub uid: &'a str,
}

impl<'a> IdentityPayload<'a> {
    #[must_use]
    pub fn from_account(account: &'a AccountSnapshot) -> Option<Self> {
        Some(Self {
            email: account.email.as_deref()?,
            uid: account.uid.as_deref()?,
        })
    }
}

/// Canonical form used to key per-email state.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
