pub mod config;
pub mod error;
pub mod messaging;
pub mod rabbitmq;
pub mod telemetry;

pub use error::{AppError, Result};
pub use rabbitmq::RabbitMQChannel;
