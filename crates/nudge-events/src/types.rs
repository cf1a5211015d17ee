use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EventRecord {
    pub id: String,
    pub at: DateTime<Utc>,
    pub correlation_id: Option<String>,
    pub source: EventSource,
    pub body: Value,
}

impl EventRecord {
    pub const PREFIX: &'static str = "evt_";

    pub fn new(
        at: DateTime<Utc>,
        source: EventSource,
        correlation_id: Option<String>,
        body: Value,
    ) -> Self {
        Self {
            id: format!("{}{}", Self::PREFIX, Ulid::new()),
            at,
            correlation_id,
            source,
            body,
        }
    }

    /// The `type` tag of the body, if the body is a tagged lifecycle event.
    pub fn kind(&self) -> Option<&str> {
        self.body.get("type").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub enum EventSource {
    Scheduler,
    Response,
    Admin,
    Cli,
}
