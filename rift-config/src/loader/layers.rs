use std::path::PathBuf;

use toml::Value as TomlValue;

use crate::loader::merge_toml_values;

/// Where a configuration layer came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// System-wide file (`/etc/rift/rift.toml`)
    System { file: PathBuf },
    /// User file (`~/.rift/rift.toml`)
    User { file: PathBuf },
    /// Workspace file (`rift.toml` in the workspace root) or an explicit file
    Workspace { file: PathBuf },
    /// Environment variable overrides
    Environment,
    /// Programmatic overrides (CLI flags, tests)
    Runtime,
}

impl ConfigLayerSource {
    pub fn file(&self) -> Option<&PathBuf> {
        match self {
            Self::System { file } | Self::User { file } | Self::Workspace { file } => Some(file),
            Self::Environment | Self::Runtime => None,
        }
    }
}

/// A single layer of configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayerEntry {
    pub source: ConfigLayerSource,
    pub config: TomlValue,
}

impl ConfigLayerEntry {
    pub fn new(source: ConfigLayerSource, config: TomlValue) -> Self {
        Self { source, config }
    }
}

/// Layers ordered from lowest to highest precedence.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayerStack {
    layers: Vec<ConfigLayerEntry>,
}

impl ConfigLayerStack {
    pub fn new(layers: Vec<ConfigLayerEntry>) -> Self {
        Self { layers }
    }

    pub fn push(&mut self, layer: ConfigLayerEntry) {
        self.layers.push(layer);
    }

    /// Merge all layers into a single effective document.
    pub fn effective_config(&self) -> TomlValue {
        let mut merged = TomlValue::Table(toml::Table::new());
        for layer in &self.layers {
            let replaced = merge_toml_values(&mut merged, &layer.config);
            if !replaced.is_empty() {
                tracing::trace!(source = ?layer.source, keys = ?replaced, "configuration layer overrides");
            }
        }
        merged
    }

    pub fn layers(&self) -> &[ConfigLayerEntry] {
        &self.layers
    }

    /// The highest-precedence layer that was read from a file.
    pub fn last_file(&self) -> Option<&PathBuf> {
        self.layers
            .iter()
            .rev()
            .find_map(|layer| layer.source.file())
    }
}
