//! Shared configuration types for the reporting services.

pub use secrecy::{ExposeSecret, SecretString};

/// Redis configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: SecretString,
}

/// `RabbitMQ` subscription configuration for a single exchange.
#[derive(Debug, Clone)]
pub struct RabbitMQConfig {
    pub url: SecretString,
    pub exchange: String,
    pub queue: String,
    pub prefetch_count: u16,
}

impl RabbitMQConfig {
    /// Name of the queue actually declared on the broker.
    ///
    /// The logical queue name is shared by every subscription of a service,
    /// so it is qualified with the exchange to keep one queue per stream.
    #[must_use]
    pub fn physical_queue(&self) -> String {
        format!("{}.{}", self.exchange, self.queue)
    }

    /// Dead-letter exchange for rejected messages.
    #[must_use]
    pub fn dead_letter_exchange(&self) -> String {
        format!("{}.dlx", self.physical_queue())
    }

    /// Queue that collects dead-lettered messages.
    #[must_use]
    pub fn poison_queue(&self) -> String {
        format!("{}.poison", self.physical_queue())
    }
}

/// Observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub otlp_endpoint: Option<SecretString>,
    /// Filter used when `RUST_LOG` is not set.
    pub log_filter: String,
    pub sample_ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RabbitMQConfig {
        RabbitMQConfig {
            url: SecretString::new("amqp://localhost:5672/%2f".to_string()),
            exchange: "lykke.wallet.transfer".to_string(),
            queue: "reporting".to_string(),
            prefetch_count: 10,
        }
    }

    #[test]
    fn queue_names_are_qualified_by_exchange() {
        let config = config();
        assert_eq!(config.physical_queue(), "lykke.wallet.transfer.reporting");
        assert_eq!(
            config.dead_letter_exchange(),
            "lykke.wallet.transfer.reporting.dlx"
        );
        assert_eq!(config.poison_queue(), "lykke.wallet.transfer.reporting.poison");
    }

    #[test]
    fn debug_output_redacts_url() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("amqp://"));
    }
}
