//! Launching allow-listed tools and tracking their executions.
//!
//! The [`ToolGateway`] is the write side: it checks the [`ToolPolicy`],
//! spawns the process and feeds its output into the [`ExecutionRegistry`].
//! The [`StatusService`] is the read side used by pollers and cancellers.

pub mod error;
pub mod execution;
pub mod gateway;
pub mod pipe;
pub mod policy;
pub mod process_group;
pub mod registry;
pub mod status;
pub mod stream;

pub use error::ExecError;
pub use execution::{Execution, ExecutionId, ExecutionStatus, OutputStream};
pub use gateway::{GatewayOptions, ToolGateway, split_args};
pub use policy::{AllowList, ToolPolicy};
pub use registry::{CancelOutcome, ChildTerminator, ExecutionRegistry};
pub use status::{ExecutionView, StatusService};
