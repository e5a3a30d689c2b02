use super::AuthError;
use std::future::Future;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-request cancellation signal and deadline.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new(cancel: CancellationToken, deadline: Option<Instant>) -> Self {
        CallContext { cancel, deadline }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn ensure_live(&self) -> Result<(), AuthError> {
        if self.cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(AuthError::Cancelled);
        }
        Ok(())
    }

    /// Run a remote call unless the request is already dead, and abandon it
    /// as soon as the request is cancelled or runs out of time.
    pub async fn guard<F, T>(&self, call: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, AuthError>>,
    {
        self.ensure_live()?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AuthError::Cancelled),
            _ = deadline => Err(AuthError::Cancelled),
            result = call => result,
        }
    }
}
