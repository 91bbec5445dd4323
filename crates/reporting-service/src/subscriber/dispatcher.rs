use std::sync::Arc;
use std::time::Duration;

use reporting_core::AppError;
use serde::de::DeserializeOwned;
use tracing::{error, instrument, warn};

use super::EventHandler;

/// Bounded retry applied to handler failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first call; values below one are raised to one.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// How a delivery is settled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ack,
    /// Reject without requeue so the broker routes it to the dead-letter exchange.
    DeadLetter,
}

/// Decodes raw payloads into `T` and hands them to the registered handler.
pub struct Dispatcher<T> {
    exchange: String,
    handler: Arc<dyn EventHandler<T>>,
    retry: RetryPolicy,
}

impl<T> Dispatcher<T>
where
    T: DeserializeOwned + Clone + Send + 'static,
{
    pub fn new(exchange: &str, handler: Arc<dyn EventHandler<T>>, retry: RetryPolicy) -> Self {
        Self {
            exchange: exchange.to_string(),
            handler,
            retry,
        }
    }

    /// Never fails: every payload ends up acknowledged or dead-lettered.
    #[instrument(skip(self, payload), fields(exchange = %self.exchange, bytes = payload.len()))]
    pub async fn dispatch(&self, payload: &[u8]) -> Outcome {
        let event = match serde_json::from_slice::<T>(payload) {
            Ok(event) => event,
            Err(e) => {
                let err = AppError::Decode(e.to_string());
                warn!(error = %err, "Dropping undecodable message to dead-letter exchange");
                return Outcome::DeadLetter;
            }
        };

        let mut attempt = 1;
        loop {
            match self.handler.handle(event.clone()).await {
                Ok(()) => return Outcome::Ack,
                Err(e) if attempt < self.retry.max_attempts => {
                    warn!(attempt, error = %e, "Handler failed, retrying");
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        attempts = attempt,
                        error = %e,
                        "Handler failed permanently, dead-lettering message"
                    );
                    return Outcome::DeadLetter;
                }
            }
        }
    }
}
