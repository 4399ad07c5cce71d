//! Layered JSON merging.

use serde_json::Value;

/// Merge `overlay` into `base`.
///
/// Objects merge key by key, recursively. Any other overlay value replaces
/// the base value outright, arrays included.
pub fn merge_values(base: &mut Value, overlay: &Value) {
    if let (Value::Object(base_map), Value::Object(overlay_map)) = (&mut *base, overlay) {
        for (key, value) in overlay_map {
            match base_map.get_mut(key) {
                Some(existing) => merge_values(existing, value),
                None => {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
    } else {
        *base = overlay.clone();
    }
}
