use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One reverse geocoding hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_names: Option<HashMap<String, String>>,
    /// Fields not modelled above, kept as received
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Place {
    /// Name in the given language, falling back to the default name
    pub fn local_name(&self, lang: &str) -> &str {
        self.local_names
            .as_ref()
            .and_then(|names| names.get(lang))
            .map(String::as_str)
            .unwrap_or(&self.name)
    }
}
