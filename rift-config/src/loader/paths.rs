use std::path::PathBuf;

use crate::constants;

/// File locations consulted below the workspace layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPaths {
    pub system: Option<PathBuf>,
    pub user: Option<PathBuf>,
}

impl ConfigPaths {
    /// Standard locations for the current platform and user.
    pub fn discover() -> Self {
        #[cfg(unix)]
        let system = Some(PathBuf::from(constants::SYSTEM_CONFIG_PATH));
        #[cfg(not(unix))]
        let system = None;

        let user = dirs::home_dir().map(|home| {
            home.join(constants::USER_CONFIG_DIR)
                .join(constants::CONFIG_FILE_NAME)
        });

        Self { system, user }
    }

    /// No system or user layers; only workspace, environment and runtime apply.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, path: impl Into<PathBuf>) -> Self {
        self.user = Some(path.into());
        self
    }
}
