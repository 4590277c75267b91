use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Types that can be requested from the model as forced tool input.
///
/// Automatically implemented for any type that implements `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Tool `input_schema` for this type: a plain object schema with every
    /// property required and no `$schema`/`title`/`definitions` noise.
    fn input_schema() -> serde_json::Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("$schema");
            map.remove("title");
            map.remove("definitions");
        }
        require_all_properties(&mut value);

        value
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn require_all_properties(value: &mut serde_json::Value) {
    if let serde_json::Value::Object(map) = value {
        if let Some(serde_json::Value::Object(props)) = map.get("properties") {
            let all_keys: Vec<serde_json::Value> = props
                .keys()
                .map(|k| serde_json::Value::String(k.clone()))
                .collect();
            map.insert("required".to_string(), serde_json::Value::Array(all_keys));
        }
    }
}
