//! Durable record format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sspr_core::ItemId;

use crate::error::ProcessorError;
use crate::item::WorkItem;

/// Wrapper persisted for every queued item.
///
/// Stored as one JSON object per deque record:
///
/// ```json
/// {"enqueued_at":"2026-01-01T00:00:00Z","id":"4F2K","item_type":"mail.send","item":"{...}"}
/// ```
///
/// `item` is the work item's own JSON encoding, kept as a string so an
/// envelope can be read without knowing the item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemEnvelope {
    enqueued_at: DateTime<Utc>,
    id: ItemId,
    item_type: String,
    item: String,
}

impl WorkItemEnvelope {
    pub fn new(
        id: ItemId,
        item_type: impl Into<String>,
        item: impl Into<String>,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            enqueued_at,
            id,
            item_type: item_type.into(),
            item: item.into(),
        }
    }

    /// Serialize `item` and wrap it under its type tag.
    pub fn wrap<T: WorkItem>(
        id: ItemId,
        item: &T,
        enqueued_at: DateTime<Utc>,
    ) -> Result<Self, ProcessorError> {
        let item = serde_json::to_string(item)?;
        Ok(Self::new(id, T::TYPE_TAG, item, enqueued_at))
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    pub fn item(&self) -> &str {
        &self.item
    }

    /// Time since enqueue; negative ages (clock moved back) clamp to zero.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.enqueued_at).max(chrono::Duration::zero())
    }

    pub fn encode(&self) -> Result<String, ProcessorError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self, ProcessorError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ping {
        host: String,
    }

    impl WorkItem for Ping {
        const TYPE_TAG: &'static str = "net.ping";
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn wrap_records_the_type_tag_and_payload() {
        let ping = Ping {
            host: "db-1".to_string(),
        };
        let envelope = WorkItemEnvelope::wrap(ItemId::from_string("7"), &ping, at(9)).unwrap();

        assert_eq!(envelope.item_type(), "net.ping");
        assert_eq!(envelope.id().as_str(), "7");
        let decoded: Ping = serde_json::from_str(envelope.item()).unwrap();
        assert_eq!(decoded, ping);
    }

    #[test]
    fn stored_form_is_a_flat_json_object() {
        let envelope = WorkItemEnvelope::new(ItemId::from_string("A1"), "t", "{}", at(0));
        let json: serde_json::Value = serde_json::from_str(&envelope.encode().unwrap()).unwrap();

        assert_eq!(json["id"], "A1");
        assert_eq!(json["item_type"], "t");
        assert_eq!(json["item"], "{}");
        assert_eq!(json["enqueued_at"], "2026-03-01T00:00:00Z");
        assert_eq!(WorkItemEnvelope::decode(&envelope.encode().unwrap()).unwrap(), envelope);
    }

    #[test]
    fn age_is_measured_from_enqueue_and_never_negative() {
        let envelope = WorkItemEnvelope::new(ItemId::from_string("1"), "t", "{}", at(10));
        assert_eq!(envelope.age(at(12)), chrono::Duration::hours(2));
        assert_eq!(envelope.age(at(8)), chrono::Duration::zero());
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        let err = WorkItemEnvelope::decode("not json").unwrap_err();
        assert!(matches!(err, ProcessorError::Serialization(_)));
    }
}
