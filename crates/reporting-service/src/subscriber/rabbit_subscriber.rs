use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_lite::stream::StreamExt;
use lapin::{
    Consumer,
    message::Delivery,
    options::{BasicAckOptions, BasicConsumeOptions, BasicRejectOptions},
    types::{AMQPValue, FieldTable},
};
use opentelemetry::{global, propagation::Extractor, trace::SpanKind};
use reporting_core::{AppError, RabbitMQChannel, config::RabbitMQConfig};
use serde::de::DeserializeOwned;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::{Dispatcher, Outcome, StartStop};

/// Exponential backoff between reconnect attempts, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    initial: Duration,
    max: Duration,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
        }
    }

    /// Wait before reconnect attempt number `attempt`, counting from zero.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.initial
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(self.max)
    }
}

/// Why a session stopped delivering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    Cancelled,
    /// The broker closed the consumer stream, usually because the connection dropped.
    Closed,
}

/// One live broker subscription.
#[async_trait]
trait Session: Send {
    async fn run(&mut self, cancel: &CancellationToken) -> StreamEnd;

    async fn close(&mut self) -> Result<(), AppError>;
}

/// Opens sessions for a single exchange.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
trait Connect: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Session>, AppError>;
}

/// Consumes one exchange, reconnecting whenever the broker drops the stream.
pub struct RabbitSubscriber {
    exchange: String,
    connector: Arc<dyn Connect>,
    reconnect: ReconnectPolicy,
    running: Mutex<Option<Running>>,
}

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<Result<(), AppError>>,
}

/// Carrier for extracting trace context from message headers.
struct HeaderExtractor(HashMap<String, String>);

impl HeaderExtractor {
    fn from_field_table(headers: &FieldTable) -> Self {
        let map = headers
            .inner()
            .iter()
            .filter_map(|(k, v)| {
                if let AMQPValue::LongString(s) = v {
                    Some((k.to_string(), s.to_string()))
                } else {
                    None
                }
            })
            .collect();
        Self(map)
    }
}

impl Extractor for HeaderExtractor {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}

impl RabbitSubscriber {
    pub fn new<T>(
        config: RabbitMQConfig,
        dispatcher: Dispatcher<T>,
        reconnect: ReconnectPolicy,
    ) -> Self
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let exchange = config.exchange.clone();
        let connector = LapinConnector {
            config,
            dispatcher: Arc::new(dispatcher),
        };
        Self::with_connector(exchange, Arc::new(connector), reconnect)
    }

    fn with_connector(
        exchange: String,
        connector: Arc<dyn Connect>,
        reconnect: ReconnectPolicy,
    ) -> Self {
        Self {
            exchange,
            connector,
            reconnect,
            running: Mutex::new(None),
        }
    }
}

#[async_trait]
impl StartStop for RabbitSubscriber {
    #[instrument(skip(self), fields(exchange = %self.exchange))]
    async fn start(&self) -> Result<(), AppError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("Subscriber already started");
            return Ok(());
        }

        let session = self.connector.connect().await?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(
            supervise(
                Arc::clone(&self.connector),
                session,
                self.reconnect,
                cancel.clone(),
            )
            .instrument(info_span!("subscription", exchange = %self.exchange)),
        );

        *running = Some(Running { cancel, task });
        Ok(())
    }

    #[instrument(skip(self), fields(exchange = %self.exchange))]
    async fn stop(&self) -> Result<(), AppError> {
        let Some(running) = self.running.lock().await.take() else {
            debug!("Subscriber not running");
            return Ok(());
        };

        running.cancel.cancel();
        match running.task.await {
            Ok(closed) => closed?,
            Err(e) => warn!(error = %e, "Consume task ended abnormally"),
        }

        info!("Subscriber stopped");
        Ok(())
    }
}

/// Runs sessions until cancelled, replacing each one the broker drops.
///
/// Returns the result of closing the last session.
async fn supervise(
    connector: Arc<dyn Connect>,
    mut session: Box<dyn Session>,
    reconnect: ReconnectPolicy,
    cancel: CancellationToken,
) -> Result<(), AppError> {
    loop {
        if session.run(&cancel).await == StreamEnd::Cancelled {
            return session.close().await;
        }

        warn!("Consumer stream closed by broker, reconnecting");
        if let Err(e) = session.close().await {
            debug!(error = %e, "Dropped session did not close cleanly");
        }

        match reestablish(connector.as_ref(), reconnect, &cancel).await {
            Some(next) => session = next,
            None => return Ok(()),
        }
    }
}

/// `None` once cancelled.
async fn reestablish(
    connector: &dyn Connect,
    reconnect: ReconnectPolicy,
    cancel: &CancellationToken,
) -> Option<Box<dyn Session>> {
    let mut attempt = 0;
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            () = tokio::time::sleep(reconnect.delay(attempt)) => {}
        }

        let connected = tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            connected = connector.connect() => connected,
        };

        match connected {
            Ok(session) => {
                info!(attempt, "Reconnected to broker");
                return Some(session);
            }
            Err(e) => {
                warn!(attempt, error = %e, "Reconnect failed");
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

fn consumer_tag(exchange: &str) -> String {
    format!("reporting-service.{exchange}")
}

struct LapinConnector<T> {
    config: RabbitMQConfig,
    dispatcher: Arc<Dispatcher<T>>,
}

#[async_trait]
impl<T> Connect for LapinConnector<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn connect(&self) -> Result<Box<dyn Session>, AppError> {
        let rabbitmq = RabbitMQChannel::try_new(&self.config).await?;

        let consumer = match rabbitmq
            .channel
            .basic_consume(
                &rabbitmq.queue,
                &consumer_tag(&self.config.exchange),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
        {
            Ok(consumer) => consumer,
            Err(e) => {
                if let Err(close_err) = rabbitmq.close().await {
                    warn!(error = %close_err, "Failed to release broker resources");
                }
                return Err(AppError::startup(&self.config.exchange, e));
            }
        };

        info!(queue = %rabbitmq.queue, "Started consuming");

        Ok(Box::new(LapinSession {
            rabbitmq,
            consumer,
            dispatcher: Arc::clone(&self.dispatcher),
        }))
    }
}

struct LapinSession<T> {
    rabbitmq: RabbitMQChannel,
    consumer: Consumer,
    dispatcher: Arc<Dispatcher<T>>,
}

#[async_trait]
impl<T> Session for LapinSession<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn run(&mut self, cancel: &CancellationToken) -> StreamEnd {
        let queue = self.rabbitmq.queue.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        loop {
            let delivery = tokio::select! {
                () = cancel.cancelled() => return StreamEnd::Cancelled,
                next = self.consumer.next() => match next {
                    Some(Ok(delivery)) => delivery,
                    Some(Err(e)) => {
                        error!(queue = %queue, error = %e, "Consumer error");
                        continue;
                    }
                    None => return StreamEnd::Closed,
                },
            };

            let parent_context = delivery
                .properties
                .headers()
                .as_ref()
                .map(|headers| {
                    let extractor = HeaderExtractor::from_field_table(headers);
                    global::get_text_map_propagator(|propagator| propagator.extract(&extractor))
                })
                .unwrap_or_default();

            let span = info_span!(
                "process_wallet_event",
                otel.kind = ?SpanKind::Consumer,
                messaging.system = "rabbitmq",
                messaging.destination = %queue,
                delivery_tag = delivery.delivery_tag,
            );
            span.set_parent(parent_context);

            async {
                let outcome = dispatcher.dispatch(&delivery.data).await;
                settle(&delivery, outcome).await;
            }
            .instrument(span)
            .await;
        }
    }

    async fn close(&mut self) -> Result<(), AppError> {
        self.rabbitmq.close().await
    }
}

async fn settle(delivery: &Delivery, outcome: Outcome) {
    let result = match outcome {
        Outcome::Ack => delivery.ack(BasicAckOptions::default()).await,
        Outcome::DeadLetter => {
            delivery
                .reject(BasicRejectOptions { requeue: false })
                .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, ?outcome, "Failed to settle message");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use reporting_core::config::SecretString;
    use serde::Deserialize;
    use tokio::{sync::Notify, time::timeout};

    use super::*;
    use crate::subscriber::{EventHandler, RetryPolicy};

    const EXCHANGE: &str = "lykke.wallet.bonusreceived";
    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Debug, Clone, Deserialize)]
    struct Noop;

    struct IgnoreHandler;

    #[async_trait]
    impl EventHandler<Noop> for IgnoreHandler {
        async fn handle(&self, _event: Noop) -> Result<(), AppError> {
            Ok(())
        }
    }

    /// Session whose stream either ends at once or runs until cancelled.
    struct FakeSession {
        dropped_by_broker: bool,
        closes: Arc<AtomicUsize>,
    }

    impl FakeSession {
        fn healthy(closes: &Arc<AtomicUsize>) -> Box<dyn Session> {
            Box::new(Self {
                dropped_by_broker: false,
                closes: Arc::clone(closes),
            })
        }

        fn dropped(closes: &Arc<AtomicUsize>) -> Box<dyn Session> {
            Box::new(Self {
                dropped_by_broker: true,
                closes: Arc::clone(closes),
            })
        }
    }

    #[async_trait]
    impl Session for FakeSession {
        async fn run(&mut self, cancel: &CancellationToken) -> StreamEnd {
            if self.dropped_by_broker {
                return StreamEnd::Closed;
            }
            cancel.cancelled().await;
            StreamEnd::Cancelled
        }

        async fn close(&mut self) -> Result<(), AppError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn immediate() -> ReconnectPolicy {
        ReconnectPolicy::new(Duration::ZERO, Duration::ZERO)
    }

    fn fake_subscriber(connector: MockConnect, reconnect: ReconnectPolicy) -> RabbitSubscriber {
        RabbitSubscriber::with_connector(EXCHANGE.to_string(), Arc::new(connector), reconnect)
    }

    fn lapin_subscriber(url: &str) -> RabbitSubscriber {
        let config = RabbitMQConfig {
            url: SecretString::new(url.to_string()),
            exchange: EXCHANGE.to_string(),
            queue: "reporting".to_string(),
            prefetch_count: 1,
        };
        let dispatcher = Dispatcher::new(
            &config.exchange,
            Arc::new(IgnoreHandler),
            RetryPolicy::new(1, Duration::ZERO),
        );
        RabbitSubscriber::new(config, dispatcher, immediate())
    }

    #[tokio::test]
    async fn stop_is_idempotent_on_a_started_subscriber() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut connector = MockConnect::new();
        let session_closes = Arc::clone(&closes);
        connector
            .expect_connect()
            .times(1)
            .returning(move || Ok(FakeSession::healthy(&session_closes)));
        let subscriber = fake_subscriber(connector, immediate());

        subscriber.start().await.unwrap();
        subscriber.start().await.unwrap();
        assert!(subscriber.running.lock().await.is_some());

        assert!(subscriber.stop().await.is_ok());
        assert!(subscriber.stop().await.is_ok());
        assert!(subscriber.running.lock().await.is_none());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let mut connector = MockConnect::new();
        connector.expect_connect().never();
        let subscriber = fake_subscriber(connector, immediate());

        assert!(subscriber.stop().await.is_ok());
        assert!(subscriber.stop().await.is_ok());
    }

    #[tokio::test]
    async fn reconnects_when_broker_closes_the_stream() {
        let closes = Arc::new(AtomicUsize::new(0));
        let reconnected = Arc::new(Notify::new());

        let mut connector = MockConnect::new();
        let session_closes = Arc::clone(&closes);
        let signal = Arc::clone(&reconnected);
        let mut calls = 0;
        connector.expect_connect().times(2).returning(move || {
            calls += 1;
            if calls == 1 {
                Ok(FakeSession::dropped(&session_closes))
            } else {
                signal.notify_one();
                Ok(FakeSession::healthy(&session_closes))
            }
        });
        let subscriber = fake_subscriber(connector, immediate());

        subscriber.start().await.unwrap();
        timeout(WAIT, reconnected.notified())
            .await
            .expect("subscriber should reconnect after the stream closed");

        assert!(subscriber.stop().await.is_ok());
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn keeps_retrying_until_the_broker_is_back() {
        let closes = Arc::new(AtomicUsize::new(0));
        let reconnected = Arc::new(Notify::new());

        let mut connector = MockConnect::new();
        let session_closes = Arc::clone(&closes);
        let signal = Arc::clone(&reconnected);
        let mut calls = 0;
        connector.expect_connect().times(4).returning(move || {
            calls += 1;
            match calls {
                1 => Ok(FakeSession::dropped(&session_closes)),
                2 | 3 => Err(AppError::startup(EXCHANGE, "connection refused")),
                _ => {
                    signal.notify_one();
                    Ok(FakeSession::healthy(&session_closes))
                }
            }
        });
        let subscriber = fake_subscriber(connector, immediate());

        subscriber.start().await.unwrap();
        timeout(WAIT, reconnected.notified())
            .await
            .expect("subscriber should reconnect once the broker accepts connections");

        assert!(subscriber.stop().await.is_ok());
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stop_interrupts_reconnect_backoff() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut connector = MockConnect::new();
        let session_closes = Arc::clone(&closes);
        connector
            .expect_connect()
            .times(1)
            .returning(move || Ok(FakeSession::dropped(&session_closes)));
        let hour = Duration::from_secs(3600);
        let subscriber = fake_subscriber(connector, ReconnectPolicy::new(hour, hour));

        subscriber.start().await.unwrap();

        let stopped = timeout(WAIT, subscriber.stop())
            .await
            .expect("stop must not wait for the backoff to elapse");
        assert!(stopped.is_ok());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_start_leaves_subscriber_stopped() {
        let subscriber = lapin_subscriber("amqp://127.0.0.1:1/%2f");

        let err = subscriber.start().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(subscriber.running.lock().await.is_none());
        assert!(subscriber.stop().await.is_ok());
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = ReconnectPolicy::new(Duration::from_millis(100), Duration::from_millis(1000));

        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
        assert_eq!(policy.delay(4), Duration::from_millis(1000));
        assert_eq!(policy.delay(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn cap_is_never_below_the_first_delay() {
        let policy = ReconnectPolicy::new(Duration::from_secs(2), Duration::from_secs(1));
        assert_eq!(policy.delay(0), Duration::from_secs(2));
    }

    #[test]
    fn consumer_tag_names_exchange() {
        assert_eq!(
            consumer_tag(EXCHANGE),
            "reporting-service.lykke.wallet.bonusreceived"
        );
    }
}
