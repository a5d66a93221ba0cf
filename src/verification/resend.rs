//! Sending the confirmation email again from the confirm screen.

use super::VerificationReason;
use crate::{account::AccountSnapshot, error::AuthError};
use async_trait::async_trait;
use tracing::{debug, info, instrument};

/// Asks the auth server to send the sign-up confirmation email again.
#[async_trait]
pub trait SignUpRetry: Send + Sync {
    /// `resume` is the opaque token that brings the user back to the relier
    /// once they open the link.
    async fn retry_sign_up(&self, account: &AccountSnapshot, resume: &str)
        -> Result<(), AuthError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendOutcome {
    Sent,
    /// The session is gone; the user has to start over on this route.
    RestartSignUp { route: &'static str },
}

/// Re-send the confirmation email.
///
/// # Errors
/// Anything but an invalid session token is handed back unchanged.
#[instrument(skip_all)]
pub async fn resend(
    retry: &dyn SignUpRetry,
    account: &AccountSnapshot,
    resume: &str,
) -> Result<ResendOutcome, AuthError> {
    match retry.retry_sign_up(account, resume).await {
        Ok(()) => {
            info!("confirmation email sent again");
            Ok(ResendOutcome::Sent)
        }
        Err(AuthError::InvalidToken) => {
            debug!("session token rejected, back to sign-up");
            Ok(ResendOutcome::RestartSignUp {
                route: VerificationReason::SignUp.start_route(),
            })
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::tests::full_account;
    use std::sync::Mutex;

    struct ScriptedRetry {
        reply: fn() -> Result<(), AuthError>,
        calls: Mutex<Vec<(Option<String>, String)>>,
    }

    impl ScriptedRetry {
        fn new(reply: fn() -> Result<(), AuthError>) -> Self {
            Self {
                reply,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SignUpRetry for ScriptedRetry {
        async fn retry_sign_up(
            &self,
            account: &AccountSnapshot,
            resume: &str,
        ) -> Result<(), AuthError> {
            self.calls
                .lock()
                .unwrap()
                .push((account.email.clone(), resume.to_string()));
            (self.reply)()
        }
    }

    #[tokio::test]
    async fn resend_passes_the_resume_token() {
        let retry = ScriptedRetry::new(|| Ok(()));

        let outcome = resend(&retry, &full_account(), "resume token").await.unwrap();

        assert_eq!(outcome, ResendOutcome::Sent);
        assert_eq!(
            *retry.calls.lock().unwrap(),
            vec![(
                Some("testuser@testuser.com".to_string()),
                "resume token".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn invalid_token_sends_the_user_back_to_signup() {
        let retry = ScriptedRetry::new(|| Err(AuthError::InvalidToken));

        let outcome = resend(&retry, &full_account(), "resume token").await.unwrap();

        assert_eq!(outcome, ResendOutcome::RestartSignUp { route: "signup" });
    }

    #[tokio::test]
    async fn other_errors_are_returned() {
        let retry = ScriptedRetry::new(|| Err(AuthError::from_errno(4242, "synthesized error")));

        let err = resend(&retry, &full_account(), "resume token")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("synthesized error"));
    }
}
