//! Integration contexts and the per-context profile table.

use super::capabilities::Capabilities;
use super::commands::CommandTable;
use std::fmt;
use std::str::FromStr;
use url::Url;

const WEB_CHANNEL_PREFIX: &str = "fxaccounts:";
const SYNC_SERVICE: &str = "sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContextKind {
    /// Plain web page, nobody to notify.
    #[default]
    Web,
    FxDesktopV2,
    FxFirstrunV1,
    FxFirstrunV2,
}

impl ContextKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::FxDesktopV2 => "fx_desktop_v2",
            Self::FxFirstrunV1 => "fx_firstrun_v1",
            Self::FxFirstrunV2 => "fx_firstrun_v2",
        }
    }

    /// Pick the context for a page load.
    ///
    /// Sync inside an iframe, or an explicit `fx_desktop_v2`, speaks the v2
    /// protocol; inside an iframe that is the first-run page. Everything else
    /// follows the `context` parameter and falls back to [`ContextKind::Web`].
    #[must_use]
    pub fn resolve(query: &ContextQuery) -> Self {
        let is_sync = query.service.as_deref() == Some(SYNC_SERVICE);
        let explicit = query
            .context
            .as_deref()
            .and_then(|name| name.parse::<Self>().ok());

        if (is_sync && query.in_iframe) || explicit == Some(Self::FxDesktopV2) {
            return if query.in_iframe {
                Self::FxFirstrunV1
            } else {
                Self::FxDesktopV2
            };
        }

        explicit.unwrap_or_default()
    }

    #[must_use]
    pub fn profile(self) -> Profile {
        match self {
            Self::Web => Profile {
                commands: None,
                capabilities: Capabilities::base(),
                hooks: Hooks::default(),
            },
            // The iframe first-run page talks to the same web channel.
            Self::FxDesktopV2 | Self::FxFirstrunV1 | Self::FxFirstrunV2 => Profile {
                commands: Some(CommandTable::prefixed(WEB_CHANNEL_PREFIX)),
                capabilities: Capabilities::base(),
                hooks: Hooks {
                    relay: true,
                    verify_can_link: true,
                    ..Hooks::default()
                },
            },
        }
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextKind {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "web" => Ok(Self::Web),
            "fx_desktop_v2" => Ok(Self::FxDesktopV2),
            "fx_firstrun_v1" => Ok(Self::FxFirstrunV1),
            "fx_firstrun_v2" => Ok(Self::FxFirstrunV2),
            _ => Err(format!("unknown context: {name}")),
        }
    }
}

/// Behavior switches that differ between contexts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hooks {
    /// Talk to a host at all.
    pub relay: bool,
    /// Ask the host before signing in.
    pub verify_can_link: bool,
    pub halt_after_sign_in: bool,
    pub halt_after_sign_up_poll: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub commands: Option<CommandTable>,
    pub capabilities: Capabilities,
    pub hooks: Hooks,
}

/// Page-load parameters that decide the context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextQuery {
    pub context: Option<String>,
    pub service: Option<String>,
    pub in_iframe: bool,
}

impl ContextQuery {
    /// Read `context` and `service` from a page URL's query string.
    ///
    /// # Errors
    /// Returns an error if `raw` is not a valid absolute URL.
    pub fn from_url(raw: &str, in_iframe: bool) -> Result<Self, url::ParseError> {
        let url = Url::parse(raw)?;
        let mut query = Self {
            in_iframe,
            ..Self::default()
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "context" => query.context = Some(value.into_owned()),
                "service" => query.service = Some(value.into_owned()),
                _ => {}
            }
        }

        Ok(query)
    }
}
