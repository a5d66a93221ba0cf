use crate::channel::ChannelError;
use thiserror::Error;

/// Broker misconfiguration. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("commands must be specified")]
    MissingCommandTable,
    #[error("command not found for: {0}")]
    CommandNotFound(String),
    #[error("create_channel must be overridden")]
    CreateChannelNotOverridden,
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The host declined to link the account; abort this flow step only.
    #[error("user canceled login")]
    UserCanceledLogin,
}

impl BrokerError {
    #[must_use]
    pub fn is_user_canceled(&self) -> bool {
        matches!(self, Self::UserCanceledLogin)
    }
}

/// Which error page a failure renders when it reaches the top of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPage {
    BadRequest,
    ServerError,
}

/// Errors raised by the auth server and the flows built on it.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user canceled login")]
    UserCanceledLogin,
    #[error("your verification email bounced")]
    SignupEmailBounce,
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid parameter in request body")]
    InvalidParameter,
    #[error("missing parameter in request body")]
    MissingParameter,
    #[error("could not get verification status")]
    PollingFailed,
    #[error("unexpected error")]
    Unexpected,
    #[error("{message}")]
    Server { errno: u32, message: String },
    #[error(transparent)]
    Transport(#[from] ChannelError),
}

pub mod errno {
    pub const INVALID_TOKEN: u32 = 110;
    pub const INVALID_PARAMETER: u32 = 107;
    pub const MISSING_PARAMETER: u32 = 108;
    pub const UNEXPECTED_ERROR: u32 = 999;
    pub const USER_CANCELED_LOGIN: u32 = 1001;
    pub const SIGNUP_EMAIL_BOUNCE: u32 = 1018;
    pub const POLLING_FAILED: u32 = 1022;
    pub const TRANSPORT: u32 = 1030;
}

impl AuthError {
    #[must_use]
    pub fn errno(&self) -> u32 {
        match self {
            Self::UserCanceledLogin => errno::USER_CANCELED_LOGIN,
            Self::SignupEmailBounce => errno::SIGNUP_EMAIL_BOUNCE,
            Self::InvalidToken => errno::INVALID_TOKEN,
            Self::InvalidParameter => errno::INVALID_PARAMETER,
            Self::MissingParameter => errno::MISSING_PARAMETER,
            Self::PollingFailed => errno::POLLING_FAILED,
            Self::Unexpected => errno::UNEXPECTED_ERROR,
            Self::Server { errno, .. } => *errno,
            Self::Transport(_) => errno::TRANSPORT,
        }
    }

    /// Map a raw server errno onto a known variant, keeping unknown codes intact.
    #[must_use]
    pub fn from_errno(code: u32, message: impl Into<String>) -> Self {
        match code {
            errno::USER_CANCELED_LOGIN => Self::UserCanceledLogin,
            errno::SIGNUP_EMAIL_BOUNCE => Self::SignupEmailBounce,
            errno::INVALID_TOKEN => Self::InvalidToken,
            errno::INVALID_PARAMETER => Self::InvalidParameter,
            errno::MISSING_PARAMETER => Self::MissingParameter,
            errno::POLLING_FAILED => Self::PollingFailed,
            errno::UNEXPECTED_ERROR => Self::Unexpected,
            _ => Self::Server {
                errno: code,
                message: message.into(),
            },
        }
    }

    #[must_use]
    pub fn error_page(&self) -> ErrorPage {
        match self {
            Self::InvalidParameter | Self::MissingParameter => ErrorPage::BadRequest,
            _ => ErrorPage::ServerError,
        }
    }
}
