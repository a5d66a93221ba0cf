use crate::cli::actions::{notify, Action};
use anyhow::Result;

/// Execute the provided action.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Notify(args) => notify::execute(args).await,
    }
}
