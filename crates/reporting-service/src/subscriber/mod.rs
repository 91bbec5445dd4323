mod dispatcher;
mod rabbit_subscriber;

use async_trait::async_trait;
use reporting_core::AppError;

pub use dispatcher::{Dispatcher, Outcome, RetryPolicy};
pub use rabbit_subscriber::{RabbitSubscriber, ReconnectPolicy};

/// Consumes one decoded event of type `T`.
#[async_trait]
pub trait EventHandler<T>: Send + Sync {
    async fn handle(&self, event: T) -> Result<(), AppError>;
}

/// Lifecycle of a long-running component. Both calls are idempotent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StartStop: Send + Sync {
    /// Connect and begin consuming.
    async fn start(&self) -> Result<(), AppError>;

    /// Finish the in-flight message and release broker resources.
    async fn stop(&self) -> Result<(), AppError>;
}
