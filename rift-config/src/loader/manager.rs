use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::constants;
use crate::loader::config::RiftConfig;
use crate::loader::env::env_overrides;
use crate::loader::layers::{ConfigLayerEntry, ConfigLayerSource, ConfigLayerStack};
use crate::loader::paths::ConfigPaths;

/// Loads, merges and validates configuration layers.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub(crate) config: RiftConfig,
    workspace_root: Option<PathBuf>,
    pub(crate) layer_stack: ConfigLayerStack,
}

impl ConfigManager {
    /// Load configuration from the default locations.
    pub fn load() -> Result<Self> {
        if let Ok(config_path) = std::env::var(constants::env::CONFIG_PATH) {
            let trimmed = config_path.trim();
            if !trimmed.is_empty() {
                return Self::load_from_file(trimmed).with_context(|| {
                    format!(
                        "Failed to load configuration from {}={trimmed}",
                        constants::env::CONFIG_PATH
                    )
                });
            }
        }

        if let Ok(workspace_path) = std::env::var(constants::env::WORKSPACE) {
            let trimmed = workspace_path.trim();
            if !trimmed.is_empty() {
                return Self::load_from_workspace(trimmed).with_context(|| {
                    format!(
                        "Failed to load configuration from {}={trimmed}",
                        constants::env::WORKSPACE
                    )
                });
            }
        }

        Self::load_from_workspace(std::env::current_dir()?)
    }

    /// Load system, user and `<workspace>/rift.toml` layers plus environment overrides.
    pub fn load_from_workspace(workspace: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(
            &ConfigPaths::discover(),
            workspace.as_ref(),
            |key| std::env::var(key).ok(),
        )
    }

    /// Load system and user layers, then `path` as the highest file layer.
    ///
    /// Unlike the discovered layers, the explicit file must exist and parse.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut layer_stack = ConfigLayerStack::default();
        Self::push_optional_layers(&mut layer_stack, &ConfigPaths::discover());

        let toml = Self::load_toml_from_file(path)?;
        layer_stack.push(ConfigLayerEntry::new(
            ConfigLayerSource::Workspace {
                file: path.to_path_buf(),
            },
            toml,
        ));
        Self::push_env_layer(&mut layer_stack, |key| std::env::var(key).ok());

        let workspace_root = path.parent().map(Path::to_path_buf);
        Self::from_layers(layer_stack, workspace_root)
    }

    /// Fully parameterised loader used by the public constructors and tests.
    pub fn load_with<F>(paths: &ConfigPaths, workspace: &Path, env_lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut layer_stack = ConfigLayerStack::default();
        Self::push_optional_layers(&mut layer_stack, paths);

        let workspace_config = workspace.join(constants::CONFIG_FILE_NAME);
        if workspace_config.exists() {
            let toml = Self::load_toml_from_file(&workspace_config)?;
            layer_stack.push(ConfigLayerEntry::new(
                ConfigLayerSource::Workspace {
                    file: workspace_config,
                },
                toml,
            ));
        }

        Self::push_env_layer(&mut layer_stack, env_lookup);
        Self::from_layers(layer_stack, Some(workspace.to_path_buf()))
    }

    fn push_optional_layers(layer_stack: &mut ConfigLayerStack, paths: &ConfigPaths) {
        let candidates = [
            paths
                .system
                .clone()
                .map(|file| ConfigLayerSource::System { file }),
            paths
                .user
                .clone()
                .map(|file| ConfigLayerSource::User { file }),
        ];

        for source in candidates.into_iter().flatten() {
            let Some(file) = source.file().cloned() else {
                continue;
            };
            if !file.exists() {
                continue;
            }
            match Self::load_toml_from_file(&file) {
                Ok(toml) => layer_stack.push(ConfigLayerEntry::new(source, toml)),
                Err(err) => {
                    tracing::warn!(path = %file.display(), error = %err, "skipping unreadable config layer");
                }
            }
        }
    }

    fn push_env_layer<F>(layer_stack: &mut ConfigLayerStack, env_lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(table) = env_overrides(env_lookup) {
            layer_stack.push(ConfigLayerEntry::new(
                ConfigLayerSource::Environment,
                toml::Value::Table(table),
            ));
        }
    }

    fn from_layers(layer_stack: ConfigLayerStack, workspace_root: Option<PathBuf>) -> Result<Self> {
        let config = Self::evaluate(&layer_stack)?;
        Ok(Self {
            config,
            workspace_root,
            layer_stack,
        })
    }

    pub(crate) fn evaluate(layer_stack: &ConfigLayerStack) -> Result<RiftConfig> {
        let config: RiftConfig = if layer_stack.layers().is_empty() {
            RiftConfig::default()
        } else {
            layer_stack
                .effective_config()
                .try_into()
                .context("Failed to deserialize effective configuration")?
        };

        config
            .validate()
            .context("Configuration failed validation")?;
        Ok(config)
    }

    fn load_toml_from_file(path: &Path) -> Result<toml::Value> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let value: toml::Value = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(value)
    }

    pub fn config(&self) -> &RiftConfig {
        &self.config
    }

    pub fn into_config(self) -> RiftConfig {
        self.config
    }

    pub fn layer_stack(&self) -> &ConfigLayerStack {
        &self.layer_stack
    }

    /// Highest-precedence file that contributed to the configuration.
    pub fn config_path(&self) -> Option<&Path> {
        self.layer_stack.last_file().map(PathBuf::as_path)
    }

    pub fn workspace_root(&self) -> Option<&Path> {
        self.workspace_root.as_deref()
    }
}
