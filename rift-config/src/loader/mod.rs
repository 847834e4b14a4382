pub mod layers;

mod builder;
mod config;
mod env;
mod manager;
mod merge;
mod paths;


pub use builder::ConfigBuilder;
pub use config::RiftConfig;
pub use env::env_overrides;
pub use manager::ConfigManager;
pub use merge::merge_toml_values;
pub use paths::ConfigPaths;
