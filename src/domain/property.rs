use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::collections::BTreeMap;

/// Field map of an event. Ordered so serialized payloads are canonical.
pub type Properties = BTreeMap<String, Property>;

/// A JSON-compatible event value.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Null,
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`.
    UInt(u64),
    Float(f64),
    String(String),
    List(Vec<Property>),
    Map(Properties),
}

impl Property {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Property::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Properties> {
        match self {
            Property::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Property::Null)
    }
}

impl Serialize for Property {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Property::Null => serializer.serialize_unit(),
            Property::Bool(b) => serializer.serialize_bool(*b),
            Property::Int(i) => serializer.serialize_i64(*i),
            Property::UInt(u) => serializer.serialize_u64(*u),
            Property::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            // JSON has no NaN or infinity
            Property::Float(_) => serializer.serialize_i64(0),
            Property::String(s) => serializer.serialize_str(s),
            Property::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Property::Map(map) => map.serialize(serializer),
        }
    }
}

impl From<serde_json::Value> for Property {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Property::Null,
            Value::Bool(b) => Property::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Property::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Property::UInt(u)
                } else {
                    Property::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => Property::String(s),
            Value::Array(items) => Property::List(items.into_iter().map(Property::from).collect()),
            Value::Object(map) => Property::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Property::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Property {
    fn from(value: bool) -> Self {
        Property::Bool(value)
    }
}

impl From<i32> for Property {
    fn from(value: i32) -> Self {
        Property::Int(i64::from(value))
    }
}

impl From<i64> for Property {
    fn from(value: i64) -> Self {
        Property::Int(value)
    }
}

impl From<u64> for Property {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(i) => Property::Int(i),
            Err(_) => Property::UInt(value),
        }
    }
}

impl From<f64> for Property {
    fn from(value: f64) -> Self {
        Property::Float(value)
    }
}

impl From<&str> for Property {
    fn from(value: &str) -> Self {
        Property::String(value.to_string())
    }
}

impl From<String> for Property {
    fn from(value: String) -> Self {
        Property::String(value)
    }
}

impl From<Vec<Property>> for Property {
    fn from(value: Vec<Property>) -> Self {
        Property::List(value)
    }
}

impl From<Properties> for Property {
    fn from(value: Properties) -> Self {
        Property::Map(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_value() {
        let property = Property::from(json!({
            "count": 3,
            "ratio": 0.5,
            "tags": ["a", null],
            "nested": {"ok": true}
        }));

        let map = property.as_map().unwrap();
        assert_eq!(map["count"], Property::Int(3));
        assert_eq!(map["ratio"], Property::Float(0.5));
        assert_eq!(
            map["tags"],
            Property::List(vec![Property::from("a"), Property::Null])
        );
        assert_eq!(map["nested"].as_map().unwrap()["ok"], Property::Bool(true));
    }

    #[test]
    fn test_large_unsigned_integers_keep_precision() {
        let property = Property::from(json!({"id": u64::MAX, "small": 7}));
        let map = property.as_map().unwrap();
        assert_eq!(map["id"], Property::UInt(u64::MAX));
        assert_eq!(map["small"], Property::Int(7));
        assert_eq!(Property::from(42u64), Property::Int(42));

        assert_eq!(
            serde_json::to_string(&property).unwrap(),
            format!("{{\"id\":{},\"small\":7}}", u64::MAX)
        );
    }

    #[test]
    fn test_nested_non_finite_serializes_as_zero() {
        let property = Property::List(vec![
            Property::Float(f64::NAN),
            Property::Float(1.25),
            Property::Float(f64::NEG_INFINITY),
        ]);
        assert_eq!(serde_json::to_string(&property).unwrap(), "[0,1.25,0]");
    }
}
