//! Configuration for reporting-service.

use std::time::Duration;

use reporting_core::config::{ObservabilityConfig, RedisConfig, SecretString};
use serde::Deserialize;

use crate::composition::SubscriberSettings;
use crate::subscriber::{ReconnectPolicy, RetryPolicy};
use crate::subscriptions::FeatureFlags;

/// Configuration for reporting-service, read from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// `RabbitMQ` connection URL used by every subscriber.
    pub rabbitmq_url: SecretString,

    /// Disables the public blockchain subscriptions. Unset means enabled.
    #[serde(default)]
    pub is_public_blockchain_feature_disabled: Option<bool>,

    /// Unacknowledged deliveries allowed per subscriber channel.
    #[serde(default = "default_prefetch_count")]
    pub rabbitmq_prefetch_count: u16,

    /// Handler attempts per message before dead-lettering.
    #[serde(default = "default_handler_max_attempts")]
    pub handler_max_attempts: u32,

    /// Delay between handler attempts, in milliseconds.
    #[serde(default = "default_handler_retry_delay_ms")]
    pub handler_retry_delay_ms: u64,

    /// First wait before reconnecting a dropped subscription, in milliseconds.
    #[serde(default = "default_reconnect_delay_ms")]
    pub rabbitmq_reconnect_delay_ms: u64,

    /// Upper bound for the doubling reconnect wait, in milliseconds.
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub rabbitmq_reconnect_max_delay_ms: u64,

    /// Redis connection URL for the report store.
    pub redis_url: SecretString,

    /// OTEL exporter endpoint (optional).
    #[serde(default)]
    pub otel_exporter_endpoint: Option<SecretString>,

    #[serde(default = "default_otel_sample_ratio")]
    pub otel_sample_ratio: f64,

    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_prefetch_count() -> u16 {
    10
}

fn default_handler_max_attempts() -> u32 {
    3
}

fn default_handler_retry_delay_ms() -> u64 {
    1000
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_otel_sample_ratio() -> f64 {
    1.0
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Config {
    /// Reads the configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or malformed.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    #[must_use]
    pub fn feature_flags(&self) -> FeatureFlags {
        FeatureFlags::from_setting(self.is_public_blockchain_feature_disabled)
    }

    #[must_use]
    pub fn subscriber_settings(&self) -> SubscriberSettings {
        SubscriberSettings {
            url: self.rabbitmq_url.clone(),
            prefetch_count: self.rabbitmq_prefetch_count,
            retry: RetryPolicy::new(
                self.handler_max_attempts,
                Duration::from_millis(self.handler_retry_delay_ms),
            ),
            reconnect: ReconnectPolicy::new(
                Duration::from_millis(self.rabbitmq_reconnect_delay_ms),
                Duration::from_millis(self.rabbitmq_reconnect_max_delay_ms),
            ),
        }
    }

    #[must_use]
    pub fn redis_config(&self) -> RedisConfig {
        RedisConfig {
            url: self.redis_url.clone(),
        }
    }

    #[must_use]
    pub fn observability_config(&self) -> ObservabilityConfig {
        ObservabilityConfig {
            otlp_endpoint: self.otel_exporter_endpoint.clone(),
            log_filter: self.log_filter.clone(),
            sample_ratio: self.otel_sample_ratio,
        }
    }
}
