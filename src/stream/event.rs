//! Change notifications emitted for the works tree.

use serde::{Deserialize, Serialize};

use crate::store::operations::works::Work;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventName {
    Insert,
    Modify,
    Remove,
    /// Anything the feed may carry that this service does not handle.
    #[serde(other)]
    Unknown,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Modify => "MODIFY",
            Self::Remove => "REMOVE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub event_name: EventName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Work>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Work>,
}

impl ChangeEvent {
    pub fn is_remove(&self) -> bool {
        self.event_name == EventName::Remove
    }

    fn image(&self) -> Option<&Work> {
        self.new_image.as_ref().or(self.old_image.as_ref())
    }

    /// Id of the work this event is about, for logs.
    pub fn work_id(&self) -> Option<&str> {
        self.image().map(|w| w.id.as_str())
    }

    /// Model whose products the event may touch.
    pub fn model_id(&self) -> Option<&str> {
        self.image().and_then(Work::model).map(|m| m.id.as_str())
    }
}

/// A batch of change events as delivered by the feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeBatch {
    #[serde(default)]
    pub records: Vec<ChangeEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_event_names_deserialize() {
        let event: ChangeEvent =
            serde_json::from_value(serde_json::json!({ "eventName": "TTL_EXPIRE" })).unwrap();
        assert_eq!(event.event_name, EventName::Unknown);
        assert!(event.work_id().is_none());
    }

    #[test]
    fn names_are_uppercase_on_the_wire() {
        let json = serde_json::to_value(ChangeEvent {
            event_name: EventName::Remove,
            old_image: None,
            new_image: None,
        })
        .unwrap();
        assert_eq!(json["eventName"], "REMOVE");
        assert!(json.get("oldImage").is_none());
    }
}
