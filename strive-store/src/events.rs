use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use std::time::Duration;
use strive_shared::events::{
    BookingCancelledEvent, BookingConfirmedEvent, PackagePurchasedEvent, WaitlistPromotedEvent,
};
use tracing::{error, info};

pub const TOPIC_BOOKING_CONFIRMED: &str = "booking.confirmed";
pub const TOPIC_BOOKING_CANCELLED: &str = "booking.cancelled";
pub const TOPIC_WAITLIST_PROMOTED: &str = "waitlist.promoted";
pub const TOPIC_PACKAGE_PURCHASED: &str = "package.purchased";

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(0)))
            .await
        {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }

    async fn publish_json<T: Serialize>(&self, topic: &str, key: &str, event: &T) {
        match serde_json::to_string(event) {
            // Delivery is best-effort by contract
            Ok(payload) => {
                let _ = self.publish(topic, key, &payload).await;
            }
            Err(e) => error!("Failed to serialize event for {}: {}", topic, e),
        }
    }

    pub async fn booking_confirmed(&self, event: &BookingConfirmedEvent) {
        self.publish_json(
            TOPIC_BOOKING_CONFIRMED,
            &event.class_id.to_string(),
            event,
        )
        .await;
    }

    pub async fn booking_cancelled(&self, event: &BookingCancelledEvent) {
        self.publish_json(
            TOPIC_BOOKING_CANCELLED,
            &event.class_id.to_string(),
            event,
        )
        .await;
    }

    pub async fn waitlist_promoted(&self, event: &WaitlistPromotedEvent) {
        self.publish_json(
            TOPIC_WAITLIST_PROMOTED,
            &event.class_id.to_string(),
            event,
        )
        .await;
    }

    pub async fn package_purchased(&self, event: &PackagePurchasedEvent) {
        self.publish_json(TOPIC_PACKAGE_PURCHASED, &event.user_id.to_string(), event)
            .await;
    }
}
