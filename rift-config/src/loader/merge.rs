use toml::Value as TomlValue;

/// Merge `overlay` into `base` and return the dotted keys whose existing
/// values were replaced.
///
/// Tables merge key by key. Arrays are not concatenated: a layer that sets
/// `tools.allowed` owns the whole list.
pub fn merge_toml_values(base: &mut TomlValue, overlay: &TomlValue) -> Vec<String> {
    let mut replaced = Vec::new();
    merge_at(base, overlay, "", &mut replaced);
    replaced
}

fn merge_at(base: &mut TomlValue, overlay: &TomlValue, path: &str, replaced: &mut Vec<String>) {
    match (base, overlay) {
        (TomlValue::Table(base_table), TomlValue::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                match base_table.get_mut(key) {
                    Some(existing) => merge_at(existing, value, &child, replaced),
                    None => {
                        base_table.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => {
            if !path.is_empty() && *slot != *value {
                replaced.push(path.to_string());
            }
            *slot = value.clone();
        }
    }
}
