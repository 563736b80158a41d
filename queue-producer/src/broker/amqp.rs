//! AMQP broker binding built on lapin.
//!
//! Immediate sends go through the default exchange with the topic as the
//! routing key. Deferred sends go through an `x-delayed-message` exchange
//! (RabbitMQ delayed message plugin) with the delay in the `x-delay` header.
//! Each topic gets a durable queue, declared on first use and bound to the
//! delayed exchange.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::TimeDelta;
use lapin::{
    options::{
        BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable},
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::Broker;
use crate::config::{BrokerOptions, ProducerConfig};
use crate::error::BrokerError;

const DELAY_HEADER: &str = "x-delay";

/// AMQP connection shared by every publish call.
///
/// The channel is reopened lazily if the broker drops it.
pub struct AmqpBroker {
    uri: String,
    options: BrokerOptions,
    connection: RwLock<Option<Connection>>,
    channel: RwLock<Option<Channel>>,
    declared_topics: Mutex<HashSet<String>>,
    stopped: AtomicBool,
}

impl AmqpBroker {
    /// Connect to the broker described by `config`.
    pub async fn connect(config: &ProducerConfig) -> Result<Self, BrokerError> {
        let broker = Self::new(config)?;
        broker.ensure_connected().await?;
        Ok(broker)
    }

    fn new(config: &ProducerConfig) -> Result<Self, BrokerError> {
        Ok(Self {
            uri: config.amqp_uri()?,
            options: config.broker.clone(),
            connection: RwLock::new(None),
            channel: RwLock::new(None),
            declared_topics: Mutex::new(HashSet::new()),
            stopped: AtomicBool::new(false),
        })
    }

    /// Ensure we have a valid connection and channel.
    async fn ensure_connected(&self) -> Result<Channel, BrokerError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(BrokerError::Stopped);
        }

        {
            let channel = self.channel.read().await;
            if let Some(ch) = channel.as_ref() {
                if ch.status().connected() {
                    return Ok(ch.clone());
                }
            }
        }

        let mut connection = self.connection.write().await;
        let mut channel = self.channel.write().await;

        // Double-check after acquiring write lock; stop() may have run meanwhile.
        if self.stopped.load(Ordering::Acquire) {
            return Err(BrokerError::Stopped);
        }
        if let Some(ch) = channel.as_ref() {
            if ch.status().connected() {
                return Ok(ch.clone());
            }
        }

        info!(connection_name = %self.options.connection_name, "amqp_broker_connecting");

        let properties = ConnectionProperties::default()
            .with_connection_name(self.options.connection_name.clone().into());
        let conn = Connection::connect(&self.uri, properties).await?;
        let ch = conn.create_channel().await?;

        if self.options.publisher_confirms {
            ch.confirm_select(ConfirmSelectOptions::default()).await?;
        }

        let mut exchange_args = FieldTable::default();
        exchange_args.insert("x-delayed-type".into(), AMQPValue::LongString("direct".into()));
        ch.exchange_declare(
            &self.options.delayed_exchange,
            ExchangeKind::Custom("x-delayed-message".to_string()),
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            exchange_args,
        )
        .await?;

        info!(
            delayed_exchange = %self.options.delayed_exchange,
            publisher_confirms = self.options.publisher_confirms,
            "amqp_broker_connected"
        );

        // A fresh channel may face a broker that lost non-durable state.
        self.declared_topics.lock().await.clear();

        *connection = Some(conn);
        *channel = Some(ch.clone());

        Ok(ch)
    }

    /// Declare the topic's queue and bind it to the delayed exchange, once.
    async fn ensure_topic(&self, channel: &Channel, topic: &str) -> Result<(), BrokerError> {
        let mut declared = self.declared_topics.lock().await;
        if declared.contains(topic) {
            return Ok(());
        }

        channel
            .queue_declare(
                topic,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_bind(
                topic,
                &self.options.delayed_exchange,
                topic,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(topic = topic, "amqp_topic_declared");
        declared.insert(topic.to_string());
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        topic: &str,
        body: &[u8],
        properties: BasicProperties,
    ) -> Result<(), BrokerError> {
        let channel = self.ensure_connected().await?;
        self.ensure_topic(&channel, topic).await?;

        let confirmation = channel
            .basic_publish(
                exchange,
                topic,
                BasicPublishOptions::default(),
                body,
                properties
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/json".into()),
            )
            .await?
            .await?;

        if confirmation.is_nack() {
            return Err(BrokerError::Rejected(format!(
                "broker nacked message on {topic}"
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn send_now(&self, topic: &str, body: &[u8]) -> Result<(), BrokerError> {
        self.publish("", topic, body, BasicProperties::default())
            .await
    }

    async fn send_delayed(
        &self,
        topic: &str,
        body: &[u8],
        delay: TimeDelta,
    ) -> Result<(), BrokerError> {
        let properties = BasicProperties::default().with_headers(delay_headers(delay));
        self.publish(&self.options.delayed_exchange, topic, body, properties)
            .await
    }

    /// Close the channel and connection gracefully.
    async fn stop(&self) {
        self.stopped.store(true, Ordering::Release);

        let mut connection = self.connection.write().await;
        let mut channel = self.channel.write().await;

        if let Some(ch) = channel.take() {
            if let Err(e) = ch.close(200, "Normal shutdown").await {
                warn!(error = %e, "amqp_channel_close_error");
            }
        }

        if let Some(conn) = connection.take() {
            if let Err(e) = conn.close(200, "Normal shutdown").await {
                warn!(error = %e, "amqp_connection_close_error");
            }
        }

        info!("amqp_broker_stopped");
    }
}

fn delay_headers(delay: TimeDelta) -> FieldTable {
    let mut headers = FieldTable::default();
    headers.insert(
        DELAY_HEADER.into(),
        AMQPValue::LongLongInt(delay.num_milliseconds()),
    );
    headers
}
