use super::error::EventError;
use super::property::{Properties, Property};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Track,
    Identify,
    Screen,
    Group,
    Alias,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Track => "track",
            EventKind::Identify => "identify",
            EventKind::Screen => "screen",
            EventKind::Group => "group",
            EventKind::Alias => "alias",
        }
    }

    /// Top-level field every event of this kind must carry.
    fn required_field(self) -> Option<&'static str> {
        match self {
            EventKind::Track => Some("event"),
            EventKind::Screen => Some("name"),
            EventKind::Group => Some("groupId"),
            EventKind::Alias => Some("previousId"),
            EventKind::Identify => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" => Ok(EventKind::Track),
            "identify" => Ok(EventKind::Identify),
            "screen" => Ok(EventKind::Screen),
            "group" => Ok(EventKind::Group),
            "alias" => Ok(EventKind::Alias),
            other => Err(EventError::UnknownKind(other.to_string())),
        }
    }
}

/// An immutable, validated analytics event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    fields: Properties,
}

impl EventRecord {
    pub fn builder(kind: EventKind) -> EventBuilder {
        EventBuilder::new(kind)
    }

    /// Validates a raw field map, filling in `messageId` and `timestamp`
    /// when absent.
    pub fn from_fields(mut fields: Properties) -> Result<Self, EventError> {
        let kind = match fields.get("type").and_then(Property::as_str) {
            Some(kind) => kind.parse::<EventKind>()?,
            None => return Err(EventError::MissingField { kind: None, field: "type" }),
        };
        validate(kind, &fields)?;

        fields
            .entry("messageId".to_string())
            .or_insert_with(|| Property::String(Uuid::new_v4().to_string()));
        fields
            .entry("timestamp".to_string())
            .or_insert_with(|| Property::String(format_timestamp(Utc::now())));

        Ok(Self { fields })
    }

    pub fn fields(&self) -> &Properties {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.fields.get(key)
    }

    pub fn message_id(&self) -> Option<&str> {
        self.get("messageId").and_then(Property::as_str)
    }

    pub fn kind(&self) -> Option<EventKind> {
        self.get("type")
            .and_then(Property::as_str)
            .and_then(|kind| kind.parse().ok())
    }

    pub fn advertising_id(&self) -> Option<&str> {
        self.get("context")
            .and_then(Property::as_map)
            .and_then(|context| context.get("device"))
            .and_then(Property::as_map)
            .and_then(|device| device.get("advertisingId"))
            .and_then(Property::as_str)
    }

    /// Returns a copy with `context.device.advertisingId` set, unless one is
    /// already present.
    pub(crate) fn with_advertising_id(mut self, id: &str) -> Self {
        if self.advertising_id().is_some() {
            return self;
        }
        let mut context = match self.fields.remove("context") {
            Some(Property::Map(map)) => map,
            _ => Properties::new(),
        };
        let mut device = match context.remove("device") {
            Some(Property::Map(map)) => map,
            _ => Properties::new(),
        };
        device.insert("advertisingId".to_string(), Property::from(id));
        context.insert("device".to_string(), Property::Map(device));
        self.fields
            .insert("context".to_string(), Property::Map(context));
        self
    }
}

impl TryFrom<serde_json::Value> for EventRecord {
    type Error = EventError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match Property::from(value) {
            Property::Map(fields) => Self::from_fields(fields),
            _ => Err(EventError::NotAnObject),
        }
    }
}

fn validate(kind: EventKind, fields: &Properties) -> Result<(), EventError> {
    let has_identity = ["userId", "anonymousId"].iter().any(|key| {
        fields
            .get(*key)
            .and_then(Property::as_str)
            .is_some_and(|id| !id.is_empty())
    });
    if !has_identity {
        return Err(EventError::MissingIdentity);
    }

    if let Some(field) = kind.required_field() {
        let present = fields.get(field).is_some_and(|value| !value.is_null());
        if !present {
            return Err(EventError::MissingField {
                kind: Some(kind),
                field,
            });
        }
    }
    Ok(())
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Collects the fields of an event before validation.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    kind: EventKind,
    fields: Properties,
    properties: Properties,
    traits: Properties,
    context: Properties,
    timestamp: Option<DateTime<Utc>>,
}

impl EventBuilder {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            fields: Properties::new(),
            properties: Properties::new(),
            traits: Properties::new(),
            context: Properties::new(),
            timestamp: None,
        }
    }

    pub fn user_id(self, id: impl Into<String>) -> Self {
        self.field("userId", id.into())
    }

    pub fn anonymous_id(self, id: impl Into<String>) -> Self {
        self.field("anonymousId", id.into())
    }

    /// Event name of a track call.
    pub fn event(self, name: impl Into<String>) -> Self {
        self.field("event", name.into())
    }

    /// Screen name.
    pub fn name(self, name: impl Into<String>) -> Self {
        self.field("name", name.into())
    }

    pub fn group_id(self, id: impl Into<String>) -> Self {
        self.field("groupId", id.into())
    }

    pub fn previous_id(self, id: impl Into<String>) -> Self {
        self.field("previousId", id.into())
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Property>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn trait_value(mut self, key: impl Into<String>, value: impl Into<Property>) -> Self {
        self.traits.insert(key.into(), value.into());
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: impl Into<Property>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }

    /// Sets an arbitrary top-level field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Property>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<EventRecord, EventError> {
        let EventBuilder {
            kind,
            mut fields,
            properties,
            traits,
            context,
            timestamp,
        } = self;

        validate(kind, &fields)?;

        for (key, map) in [
            ("properties", properties),
            ("traits", traits),
            ("context", context),
        ] {
            if !map.is_empty() {
                fields.insert(key.to_string(), Property::Map(map));
            }
        }
        fields.insert("type".to_string(), Property::from(kind.as_str()));
        fields
            .entry("messageId".to_string())
            .or_insert_with(|| Property::String(Uuid::new_v4().to_string()));
        fields.insert(
            "timestamp".to_string(),
            Property::String(format_timestamp(timestamp.unwrap_or_else(Utc::now))),
        );

        Ok(EventRecord { fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_builder_sets_envelope_fields() {
        let at = Utc.with_ymd_and_hms(2024, 5, 4, 10, 30, 0).unwrap();
        let event = EventRecord::builder(EventKind::Screen)
            .anonymous_id("anon-7")
            .name("Checkout")
            .property("step", 2)
            .timestamp(at)
            .build()
            .unwrap();

        assert_eq!(event.kind(), Some(EventKind::Screen));
        assert_eq!(
            event.get("timestamp").and_then(Property::as_str),
            Some("2024-05-04T10:30:00.000Z")
        );
        let message_id = event.message_id().unwrap();
        assert!(Uuid::parse_str(message_id).is_ok());
        assert_eq!(
            event.get("properties").and_then(Property::as_map).unwrap()["step"],
            Property::Int(2)
        );
    }

    #[test]
    fn test_builder_requires_identity() {
        let err = EventRecord::builder(EventKind::Identify)
            .trait_value("email", "a@example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, EventError::MissingIdentity));
    }

    #[test]
    fn test_builder_requires_kind_specific_field() {
        let err = EventRecord::builder(EventKind::Group)
            .user_id("u1")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            EventError::MissingField {
                kind: Some(EventKind::Group),
                field: "groupId"
            }
        ));

        assert!(
            EventRecord::builder(EventKind::Alias)
                .user_id("u1")
                .previous_id("u0")
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_try_from_json() {
        let event = EventRecord::try_from(json!({
            "type": "track",
            "event": "Signed Up",
            "userId": "u-1",
            "messageId": "fixed-id"
        }))
        .unwrap();

        assert_eq!(event.message_id(), Some("fixed-id"));
        assert!(event.get("timestamp").is_some());

        assert!(matches!(
            EventRecord::try_from(json!(["not", "an", "object"])),
            Err(EventError::NotAnObject)
        ));
        assert!(matches!(
            EventRecord::try_from(json!({"type": "pageview", "userId": "u"})),
            Err(EventError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_advertising_id_is_added_once() {
        let event = EventRecord::builder(EventKind::Track)
            .user_id("u")
            .event("Opened")
            .context("app", "demo")
            .build()
            .unwrap();
        assert_eq!(event.advertising_id(), None);

        let event = event.with_advertising_id("ad-1");
        assert_eq!(event.advertising_id(), Some("ad-1"));
        let context = event.get("context").and_then(Property::as_map).unwrap();
        assert_eq!(context["app"], Property::from("demo"));

        let event = event.with_advertising_id("ad-2");
        assert_eq!(event.advertising_id(), Some("ad-1"));
    }
}
