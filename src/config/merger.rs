//! Layering of `convoy.yml` with `convoy.local.yml`.
//!
//! A local overlay lets an operator point hosts at a staging address or
//! bump a timeout without editing the shared file.
//!
//! # Merge Rules
//!
//! - Mappings merge key by key
//! - Sequences (step lists) are replaced whole
//! - `null` in the overlay removes the key
//! - Any other overlay value wins

use serde_yaml::Value;

/// Merge `overlay` on top of `base`, returning a new value.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            let mut merged = base_map.clone();

            for (key, value) in overlay_map {
                if value.is_null() {
                    merged.remove(key);
                    continue;
                }
                let next = match base_map.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }

            Value::Mapping(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Fold a list of layers, lowest priority first.
pub fn merge_configs(layers: &[Value]) -> Value {
    layers
        .iter()
        .fold(Value::Mapping(Default::default()), |acc, layer| {
            deep_merge(&acc, layer)
        })
}
