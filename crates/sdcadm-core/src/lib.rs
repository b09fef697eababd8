//! sdcadm Core - update procedures for a compute fleet
//!
//! The engine that drives rolling agent updates:
//! - Checks fleet-management compatibility before touching anything
//! - Fans per-server installs out through a bounded work queue
//! - Polls remote tasks until they finish or time out
//! - Aggregates per-server failures into one reportable error
//!
//! # Example
//!
//! ```rust,ignore
//! use sdcadm_core::prelude::*;
//!
//! # async fn example(clients: Clients, change: Change) -> Result<(), UpgradeError> {
//! let procedure = UpdateAgentProcedure::new(vec![change])?;
//! println!("{}", procedure.summarize());
//!
//! let ctx = ExecutionContext::new(clients, Plan::default());
//! procedure.execute(&ctx).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod clients;
pub mod config;
pub mod context;
pub mod error;
pub mod poll;
pub mod procedure;
pub mod queue;
pub mod types;
pub mod update_agent;
pub mod version;

// Re-exports for convenience
pub use clients::{Clients, CnapiClient, InventoryClient};
pub use config::UpdateConfig;
pub use context::{ExecutionContext, NoopProgress, Progress, StdoutProgress};
pub use error::{ApiErrorBody, ClientError, ErrorCode, FieldError, MultiError, UpgradeError};
pub use poll::{poll_until, wait_for_agent_image, wait_for_task, PollOptions, PollState};
pub use procedure::{run_procedures, summarize_all, Procedure};
pub use queue::{FailureCollector, WorkQueue};
pub use types::{
    AgentRecord, Change, Image, Instance, Plan, Server, Service, ServiceKind, Task, TaskEvent,
    TaskHandle, TaskStatus, CNAPI, CN_AGENT,
};
pub use update_agent::UpdateAgentProcedure;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with sdcadm core
    pub use crate::{
        Change, Clients, ExecutionContext, Image, Instance, Plan, Procedure, Service,
        UpdateAgentProcedure, UpdateConfig, UpgradeError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
