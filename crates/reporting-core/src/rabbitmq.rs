//! `RabbitMQ` connection, channel and subscription topology.

use lapin::{
    Channel, Connection, ConnectionProperties, ExchangeKind,
    options::{BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable, LongString},
};
use tracing::{info, instrument, warn};

use crate::{AppError, config::ExposeSecret, config::RabbitMQConfig};

const REPLY_SUCCESS: u16 = 200;

/// Connection and channel owned by one subscription.
pub struct RabbitMQChannel {
    pub connection: Connection,
    pub channel: Channel,
    pub exchange: String,
    pub queue: String,
}

impl RabbitMQChannel {
    /// Connect to `RabbitMQ` and declare the subscription topology.
    ///
    /// Declares the durable fanout exchange, the durable queue (dead-lettering
    /// into `{queue}.dlx`), the dead-letter exchange and its poison queue.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Startup` if connection, channel creation,
    /// declaration, binding or qos setup fails.
    #[instrument(skip(config), fields(exchange = %config.exchange))]
    pub async fn try_new(config: &RabbitMQConfig) -> Result<Self, AppError> {
        let startup = |e: lapin::Error| AppError::startup(&config.exchange, e);

        let connection = Connection::connect(
            config.url.expose_secret(),
            ConnectionProperties::default(),
        )
        .await
        .map_err(startup)?;

        let channel = connection.create_channel().await.map_err(startup)?;

        let queue = config.physical_queue();
        let dead_letter_exchange = config.dead_letter_exchange();
        let poison_queue = config.poison_queue();

        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Fanout,
                durable_exchange(),
                FieldTable::default(),
            )
            .await
            .map_err(startup)?;

        channel
            .exchange_declare(
                &dead_letter_exchange,
                ExchangeKind::Fanout,
                durable_exchange(),
                FieldTable::default(),
            )
            .await
            .map_err(startup)?;

        channel
            .queue_declare(&poison_queue, durable_queue(), FieldTable::default())
            .await
            .map_err(startup)?;

        channel
            .queue_bind(
                &poison_queue,
                &dead_letter_exchange,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(startup)?;

        let mut arguments = FieldTable::default();
        arguments.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString(LongString::from(dead_letter_exchange.clone())),
        );

        channel
            .queue_declare(&queue, durable_queue(), arguments)
            .await
            .map_err(startup)?;

        channel
            .queue_bind(
                &queue,
                &config.exchange,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(startup)?;

        channel
            .basic_qos(config.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(startup)?;

        info!(
            exchange = %config.exchange,
            queue = %queue,
            dead_letter_exchange = %dead_letter_exchange,
            "RabbitMQ subscription topology initialized"
        );

        Ok(Self {
            connection,
            channel,
            exchange: config.exchange.clone(),
            queue,
        })
    }

    /// Close the channel, then the connection.
    ///
    /// Both are attempted even if the first close fails.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Shutdown` describing every close that failed.
    #[instrument(skip(self), fields(exchange = %self.exchange))]
    pub async fn close(&self) -> Result<(), AppError> {
        let mut failures = Vec::new();

        if let Err(e) = self.channel.close(REPLY_SUCCESS, "subscriber stopped").await {
            warn!(error = %e, "Failed to close channel");
            failures.push(format!("channel: {e}"));
        }

        if let Err(e) = self
            .connection
            .close(REPLY_SUCCESS, "subscriber stopped")
            .await
        {
            warn!(error = %e, "Failed to close connection");
            failures.push(format!("connection: {e}"));
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AppError::Shutdown(format!(
                "{}: {}",
                self.exchange,
                failures.join(", ")
            )))
        }
    }
}

fn durable_exchange() -> ExchangeDeclareOptions {
    ExchangeDeclareOptions {
        durable: true,
        ..Default::default()
    }
}

fn durable_queue() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        ..Default::default()
    }
}
