//! Configuration for the rift control plane.
//!
//! Settings are read from layered `rift.toml` files (system, user, workspace),
//! then environment overrides, then explicit runtime overrides. The merged
//! document deserializes into [`RiftConfig`], which is validated before it is
//! handed to the execution and inference crates.

pub mod constants;
pub mod debug;
pub mod inference;
pub mod loader;
pub mod tools;

pub use debug::{DebugConfig, TraceLevel};
pub use inference::{GenerationOptions, InferenceConfig};
pub use loader::layers::{ConfigLayerEntry, ConfigLayerSource, ConfigLayerStack};
pub use loader::{ConfigBuilder, ConfigManager, ConfigPaths, RiftConfig, merge_toml_values};
pub use tools::ToolsConfig;
