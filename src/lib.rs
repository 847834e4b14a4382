//! # rift
//!
//! Execution and streaming control plane behind the rift operator dashboard.
//!
//! Two independent halves share one [`ControlPlane`] handle:
//!
//! - **Tool execution** ([`rift_exec`]): allow-listed security tools are
//!   spawned without a shell, their output is captured line by line, and
//!   callers poll or cancel executions by id.
//! - **Streaming completions** ([`rift_inference`]): prompts are proxied to a
//!   local Ollama-compatible server and tokens are returned as a cancellable
//!   stream, at most one live stream per caller channel.
//!
//! Configuration comes from layered `rift.toml` files, see [`rift_config`].
//!
//! ```no_run
//! use futures::StreamExt;
//! use rift::ControlPlane;
//! use rift_config::RiftConfig;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let plane = ControlPlane::new(RiftConfig::default())?;
//!
//! let id = plane.run_tool("dig", "example.com +short")?;
//! let view = plane.get_tool_status(id.as_str())?;
//! println!("{} is {}", view.id, view.status);
//!
//! let mut tokens = plane.send_ai_message("Summarise open ports on 10.0.0.5")?;
//! while let Some(token) = tokens.next().await {
//!     print!("{}", token?);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

pub use rift_config::RiftConfig;
pub use rift_exec::{CancelOutcome, ExecError, ExecutionId, ExecutionStatus, ExecutionView};
pub use rift_inference::{DEFAULT_CHANNEL, InferenceError, ModelInfo, TokenStream};

use rift_exec::{AllowList, ExecutionRegistry, GatewayOptions, StatusService, ToolGateway};
use rift_inference::{CompletionBackend, CompletionProxy, OllamaBackend};

/// An allowed tool and where it resolves on `PATH`, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub installed: bool,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendHealth {
    pub enabled: bool,
    pub available: bool,
    pub base_url: String,
    pub model: String,
}

/// Adapter the dashboard calls into.
pub struct ControlPlane {
    config: RiftConfig,
    registry: Arc<ExecutionRegistry>,
    gateway: ToolGateway,
    status: StatusService,
    proxy: CompletionProxy,
}

impl ControlPlane {
    /// Build a control plane talking to the configured Ollama server.
    pub fn new(config: RiftConfig) -> Result<Self> {
        let backend = OllamaBackend::from_config(&config.inference)
            .context("Failed to create inference backend client")?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    pub fn with_backend(config: RiftConfig, backend: Arc<dyn CompletionBackend>) -> Self {
        let registry = Arc::new(ExecutionRegistry::new());
        let gateway = ToolGateway::new(
            Arc::new(AllowList::from_config(&config.tools)),
            Arc::clone(&registry),
            GatewayOptions::from(&config.tools),
        );
        let status = StatusService::new(Arc::clone(&registry));
        let proxy = CompletionProxy::new(backend, config.inference.clone());

        Self {
            config,
            registry,
            gateway,
            status,
            proxy,
        }
    }

    pub fn config(&self) -> &RiftConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ExecutionRegistry> {
        &self.registry
    }

    /// Start an allowed tool. `args` is split on whitespace; no shell is involved.
    pub fn run_tool(&self, tool: &str, args: &str) -> Result<ExecutionId, ExecError> {
        self.gateway.invoke(tool, args)
    }

    pub fn get_tool_status(&self, id: &str) -> Result<ExecutionView, ExecError> {
        self.status.status(id)
    }

    /// Cancel an execution. Unknown and finished ids are a no-op.
    pub fn abort_tool(&self, id: &str) -> CancelOutcome {
        self.status.cancel(id)
    }

    pub fn send_ai_message(&self, prompt: &str) -> Result<TokenStream, InferenceError> {
        self.send_ai_message_on(DEFAULT_CHANNEL, prompt)
    }

    pub fn send_ai_message_on(
        &self,
        channel: &str,
        prompt: &str,
    ) -> Result<TokenStream, InferenceError> {
        self.proxy.send(channel, prompt)
    }

    pub fn cancel_ai(&self) -> bool {
        self.cancel_ai_on(DEFAULT_CHANNEL)
    }

    pub fn cancel_ai_on(&self, channel: &str) -> bool {
        self.proxy.cancel(channel)
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.gateway
            .policy()
            .allowed()
            .into_iter()
            .map(|name| {
                let path = which::which(&name).ok();
                ToolInfo {
                    installed: path.is_some(),
                    name,
                    path,
                }
            })
            .collect()
    }

    pub async fn backend_health(&self) -> BackendHealth {
        let inference = self.proxy.config();
        let available = inference.enabled && self.proxy.backend_available().await;
        BackendHealth {
            enabled: inference.enabled,
            available,
            base_url: inference.base_url.clone(),
            model: inference.model.clone(),
        }
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, InferenceError> {
        self.proxy.list_models().await
    }
}
