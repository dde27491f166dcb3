use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;

/// Core trait for all MQ messages.
pub trait Message: Serialize + DeserializeOwned + Debug + Send + Sync + Clone {
    fn message_type() -> &'static str
    where
        Self: Sized;

    /// Identifier used to correlate log lines across publisher and consumer.
    fn message_id(&self) -> String;
}
