use crate::error::ConfigError;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Logical command names, independent of any transport's wire strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    CanLinkAccount,
    Login,
    Logout,
    ChangePassword,
    DeleteAccount,
    Loaded,
}

impl Command {
    pub const ALL: [Self; 6] = [
        Self::CanLinkAccount,
        Self::Login,
        Self::Logout,
        Self::ChangePassword,
        Self::DeleteAccount,
        Self::Loaded,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CanLinkAccount => "CAN_LINK_ACCOUNT",
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::ChangePassword => "CHANGE_PASSWORD",
            Self::DeleteAccount => "DELETE_ACCOUNT",
            Self::Loaded => "LOADED",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|command| command.as_str() == name)
            .ok_or_else(|| ConfigError::CommandNotFound(name.to_string()))
    }
}

/// Logical command name to wire string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandTable {
    entries: HashMap<Command, String>,
}

impl CommandTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, command: Command, wire: impl Into<String>) -> Self {
        self.entries.insert(command, wire.into());
        self
    }

    /// A table with every command mapped to `{prefix}{lowercase name}`.
    #[must_use]
    pub fn prefixed(prefix: &str) -> Self {
        Command::ALL.into_iter().fold(Self::new(), |table, command| {
            let wire = format!("{prefix}{}", command.as_str().to_lowercase());
            table.with(command, wire)
        })
    }

    #[must_use]
    pub fn get(&self, command: Command) -> Option<&str> {
        self.entries.get(&command).map(String::as_str)
    }

    /// Resolve a logical name given as a string.
    ///
    /// # Errors
    /// Returns [`ConfigError::CommandNotFound`] if the name is unknown or unmapped.
    pub fn resolve(&self, name: &str) -> Result<&str, ConfigError> {
        name.parse::<Command>()
            .ok()
            .and_then(|command| self.get(command))
            .ok_or_else(|| ConfigError::CommandNotFound(name.to_string()))
    }
}
