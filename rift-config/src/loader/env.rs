use crate::constants::env;

/// Translate recognised environment variables into a TOML overlay.
///
/// `lookup` abstracts `std::env::var` so callers can feed a fixed map.
/// Returns `None` when no variable is set.
pub fn env_overrides<F>(lookup: F) -> Option<toml::Table>
where
    F: Fn(&str) -> Option<String>,
{
    let mut inference = toml::Table::new();

    if let Some(url) = non_empty(lookup(env::OLLAMA_URL)) {
        inference.insert("base_url".to_string(), toml::Value::String(url));
    }
    if let Some(model) = non_empty(lookup(env::MAIN_MODEL)) {
        inference.insert("model".to_string(), toml::Value::String(model));
    }
    if let Some(flag) = non_empty(lookup(env::AI_ENABLED)) {
        match parse_bool(&flag) {
            Some(enabled) => {
                inference.insert("enabled".to_string(), toml::Value::Boolean(enabled));
            }
            None => tracing::warn!(value = %flag, "ignoring unrecognised {}", env::AI_ENABLED),
        }
    }

    if inference.is_empty() {
        return None;
    }

    let mut root = toml::Table::new();
    root.insert("inference".to_string(), toml::Value::Table(inference));
    Some(root)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
