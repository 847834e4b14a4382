use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::loader::layers::{ConfigLayerEntry, ConfigLayerSource};
use crate::loader::manager::ConfigManager;
use crate::loader::paths::ConfigPaths;

/// Builder for a [`ConfigManager`] with runtime overrides on top.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    workspace: Option<PathBuf>,
    config_file: Option<PathBuf>,
    paths: Option<ConfigPaths>,
    cli_overrides: Vec<(String, toml::Value)>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workspace(mut self, path: PathBuf) -> Self {
        self.workspace = Some(path);
        self
    }

    /// Use a specific file instead of `<workspace>/rift.toml`.
    pub fn config_file(mut self, path: PathBuf) -> Self {
        self.config_file = Some(path);
        self
    }

    /// Replace the discovered system and user file locations.
    pub fn paths(mut self, paths: ConfigPaths) -> Self {
        self.paths = Some(paths);
        self
    }

    /// Add an override by dotted key (e.g. `"inference.model"`).
    pub fn cli_override(mut self, key: impl Into<String>, value: toml::Value) -> Self {
        self.cli_overrides.push((key.into(), value));
        self
    }

    /// Add overrides from `key=value` style string pairs.
    ///
    /// Values are parsed as TOML; anything that does not parse is kept as a string.
    pub fn cli_overrides(mut self, overrides: &[(String, String)]) -> Self {
        for (key, value) in overrides {
            let toml_value = value
                .parse::<toml::Value>()
                .ok()
                .filter(|parsed| !parsed.is_table())
                .unwrap_or_else(|| toml::Value::String(value.clone()));
            self.cli_overrides.push((key.clone(), toml_value));
        }
        self
    }

    pub fn build(self) -> Result<ConfigManager> {
        let mut manager = match (self.config_file, self.workspace, self.paths) {
            (Some(config_file), _, _) => ConfigManager::load_from_file(config_file)?,
            (None, Some(workspace), Some(paths)) => {
                ConfigManager::load_with(&paths, &workspace, |key| std::env::var(key).ok())?
            }
            (None, Some(workspace), None) => ConfigManager::load_from_workspace(workspace)?,
            (None, None, _) => ConfigManager::load()?,
        };

        Self::apply_overrides(&mut manager, self.cli_overrides)?;
        Ok(manager)
    }

    /// Push `overrides` as a runtime layer and re-evaluate the manager.
    pub(crate) fn apply_overrides(
        manager: &mut ConfigManager,
        overrides: Vec<(String, toml::Value)>,
    ) -> Result<()> {
        if overrides.is_empty() {
            return Ok(());
        }

        let mut runtime_toml = toml::Table::new();
        for (key, value) in overrides {
            insert_dotted_key(&mut runtime_toml, &key, value);
        }
        manager.layer_stack.push(ConfigLayerEntry::new(
            ConfigLayerSource::Runtime,
            toml::Value::Table(runtime_toml),
        ));

        manager.config = ConfigManager::evaluate(&manager.layer_stack)
            .context("Configuration failed validation after runtime overrides")?;
        Ok(())
    }
}

fn insert_dotted_key(table: &mut toml::Table, key: &str, value: toml::Value) {
    match key.split_once('.') {
        None => {
            table.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = table
                .entry(head.to_string())
                .or_insert_with(|| toml::Value::Table(toml::Table::new()));
            if !entry.is_table() {
                *entry = toml::Value::Table(toml::Table::new());
            }
            if let toml::Value::Table(child) = entry {
                insert_dotted_key(child, rest, value);
            }
        }
    }
}
