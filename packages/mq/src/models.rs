use std::time::Duration;

pub use broccoli_queue::{
    brokers::broker::BrokerMessage, error::BroccoliError, queue::BroccoliQueue,
};
use common::mq::Message;
use tracing::{debug, info};

use crate::error::MqError;

pub type MqQueue = BroccoliQueue;

pub struct MqConfig {
    pub url: String,
    pub pool_size: u8,
}

pub async fn init_mq(config: MqConfig) -> Result<MqQueue, MqError> {
    let queue = BroccoliQueue::builder(&config.url)
        .pool_connections(config.pool_size)
        .build()
        .await
        .map_err(MqError::from)?;
    info!(pool_size = config.pool_size, "Connected to message broker");
    Ok(queue)
}

/// Publish one typed message to `topic`, bounded by `timeout`.
pub async fn publish_message<M: Message>(
    queue: &MqQueue,
    topic: &str,
    message: &M,
    timeout: Duration,
) -> Result<(), MqError> {
    let publish = queue.publish(topic, None, message, None);
    match tokio::time::timeout(timeout, publish).await {
        Ok(Ok(_)) => {
            debug!(
                topic,
                message_type = M::message_type(),
                message_id = %message.message_id(),
                "Message published"
            );
            Ok(())
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(MqError::Timeout(timeout)),
    }
}
