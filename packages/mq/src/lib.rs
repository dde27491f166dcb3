pub mod error;
pub mod models;

pub use models::{BrokerMessage, BroccoliError, MqConfig, MqQueue, init_mq, publish_message};

pub type Mq = MqQueue;
