use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Signup,
    HandleSignedInNotification,
    EmailVerificationMarketingSnippet,
    OpenWebmailButtonVisible,
}

impl Capability {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::HandleSignedInNotification => "handleSignedInNotification",
            Self::EmailVerificationMarketingSnippet => "emailVerificationMarketingSnippet",
            Self::OpenWebmailButtonVisible => "openWebmailButtonVisible",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability flags; anything never set reads as disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    flags: HashMap<Capability, bool>,
}

impl Capabilities {
    /// Defaults shared by every context.
    #[must_use]
    pub fn base() -> Self {
        Self::default()
            .with(Capability::Signup, true)
            .with(Capability::HandleSignedInNotification, true)
            .with(Capability::EmailVerificationMarketingSnippet, true)
    }

    #[must_use]
    pub fn with(mut self, capability: Capability, enabled: bool) -> Self {
        self.set(capability, enabled);
        self
    }

    pub fn set(&mut self, capability: Capability, enabled: bool) {
        self.flags.insert(capability, enabled);
    }

    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        self.flags.get(&capability).copied().unwrap_or(false)
    }
}

/// The "open webmail" shortcut on the confirm screen is only offered for
/// Gmail addresses and only when the host asked for it.
#[must_use]
pub fn open_webmail_visible(capabilities: &Capabilities, email: &str) -> bool {
    capabilities.has(Capability::OpenWebmailButtonVisible)
        && email.trim().to_lowercase().ends_with("@gmail.com")
}
