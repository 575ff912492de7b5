//! Layer merging
//!
//! - Objects: deep-merge by key
//! - Arrays: replace (last wins)
//! - Scalars: override (last wins)

use serde_json::Value;

/// Merge `overlay` on top of `base`.
///
/// A `null` overlay value overrides like any scalar.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Fold layers in precedence order; the last layer wins.
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_section_keys_survive_partial_override() {
        let base = json!({"buildbucket": {"host": "a.example", "bucket": "try"}});
        let overlay = json!({"buildbucket": {"host": "b.example"}});

        let result = deep_merge(base, overlay);
        assert_eq!(result["buildbucket"]["host"], "b.example");
        assert_eq!(result["buildbucket"]["bucket"], "try");
    }

    #[test]
    fn test_token_command_is_replaced() {
        let base = json!({"auth": {"token_command": ["luci-auth", "token"]}});
        let overlay = json!({"auth": {"token_command": ["gcloud-token"]}});

        let result = deep_merge(base, overlay);
        assert_eq!(result["auth"]["token_command"], json!(["gcloud-token"]));
    }

    #[test]
    fn test_null_overrides() {
        let result = deep_merge(json!({"auth": {"token_env": "TOKEN"}}), json!({"auth": {"token_env": null}}));
        assert!(result["auth"]["token_env"].is_null());
    }

    #[test]
    fn test_last_layer_wins() {
        let builtin = json!({"http": {"timeout_seconds": 60, "user_agent": "x"}});
        let user = json!({"http": {"timeout_seconds": 30}});
        let cli = json!({"http": {"timeout_seconds": 10}});

        let result = merge_layers(vec![builtin, user, cli]);
        assert_eq!(result["http"]["timeout_seconds"], 10);
        assert_eq!(result["http"]["user_agent"], "x");
    }

    #[test]
    fn test_no_layers() {
        assert!(merge_layers(Vec::new()).is_null());
    }
}
