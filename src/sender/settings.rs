use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Remote project settings served by the CDN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub integrations: Map<String, Value>,
    pub plan: Map<String, Value>,
    pub edge_function: Map<String, Value>,
}

impl Settings {
    /// Parses a settings document. Missing or non-object sections become
    /// empty maps.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(body)?;
        let Value::Object(mut root) = value else {
            return Err(<serde_json::Error as serde::de::Error>::custom(
                "settings document is not a JSON object",
            ));
        };

        let mut section = |key: &str| match root.remove(key) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        Ok(Self {
            integrations: section("integrations"),
            plan: section("plan"),
            edge_function: section("edgeFunction"),
        })
    }

    pub fn destination_settings(&self, key: &str) -> Option<&Map<String, Value>> {
        self.integrations.get(key).and_then(Value::as_object)
    }

    /// A destination is enabled unless it is absent or explicitly `false`.
    pub fn is_destination_enabled(&self, key: &str) -> bool {
        match self.integrations.get(key) {
            None | Some(Value::Bool(false)) => false,
            Some(_) => true,
        }
    }

    /// Collector host override carried in the integration's settings.
    pub fn api_host(&self, key: &str) -> Option<&str> {
        self.destination_settings(key)?
            .get("apiHost")
            .and_then(Value::as_str)
            .filter(|host| !host.is_empty())
    }
}
