//! Allow-list gate for tool names.

use std::collections::BTreeSet;

use rift_config::ToolsConfig;
use rift_config::constants::tools::DEFAULT_ALLOWED;

/// Decides whether a tool may be spawned.
pub trait ToolPolicy: Send + Sync {
    fn permit(&self, tool: &str) -> bool;

    /// Names this policy accepts, in a stable order.
    fn allowed(&self) -> Vec<String>;
}

/// Exact-match allow-list. No prefix, suffix or case folding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    names: BTreeSet<String>,
}

impl AllowList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .map(Into::into)
                .filter(|name: &String| !name.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &ToolsConfig) -> Self {
        Self::new(config.allowed.iter().cloned())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED.iter().copied())
    }
}

impl ToolPolicy for AllowList {
    fn permit(&self, tool: &str) -> bool {
        self.names.contains(tool)
    }

    fn allowed(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permits_every_default_tool() {
        let policy = AllowList::default();
        for tool in DEFAULT_ALLOWED {
            assert!(policy.permit(tool), "{tool} should be allowed");
        }
        assert_eq!(policy.len(), DEFAULT_ALLOWED.len());
    }

    #[test]
    fn rejects_near_misses() {
        let policy = AllowList::default();
        for tool in ["", "nma", "nmapx", "NMAP", " nmap", "nmap ", "/usr/bin/nmap", "rm"] {
            assert!(!policy.permit(tool), "{tool:?} must be rejected");
        }
    }

    #[test]
    fn config_replaces_default_set() {
        let config = ToolsConfig {
            allowed: vec!["sh".to_string(), "echo".to_string()],
            ..ToolsConfig::default()
        };
        let policy = AllowList::from_config(&config);
        assert!(policy.permit("sh"));
        assert!(!policy.permit("nmap"));
        assert_eq!(policy.allowed(), vec!["echo".to_string(), "sh".to_string()]);
    }
}
