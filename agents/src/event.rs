//! Events flowing in and out of the agents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON object payload.
pub type Payload = Map<String, Value>;

/// An event: an id plus an arbitrary JSON object.
///
/// Agents never mutate the incoming event; they emit a new one carrying the
/// original payload with their own section merged in.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Event {
    pub id: String,

    #[serde(default)]
    pub payload: Payload,
}

impl Event {
    /// Create an event with an empty payload.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: Payload::new(),
        }
    }

    /// Replace the payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// A copy of this event with `key` set to `value`.
    pub fn merged(&self, key: &str, value: Value) -> Self {
        let mut payload = self.payload.clone();
        payload.insert(key.to_string(), value);
        Self {
            id: self.id.clone(),
            payload,
        }
    }
}
