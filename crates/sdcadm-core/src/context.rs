//! Per-run execution context
//!
//! Owned by the caller and passed by reference into every procedure.

use crate::clients::Clients;
use crate::config::UpdateConfig;
use crate::types::Plan;
use std::path::PathBuf;
use std::sync::Arc;

/// Sink for human-readable status lines
pub trait Progress: Send + Sync {
    /// Emit one status line
    fn progress(&self, message: &str);
}

/// Prints progress lines to stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutProgress;

impl Progress for StdoutProgress {
    fn progress(&self, message: &str) {
        println!("{message}");
    }
}

/// Discards progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl Progress for NoopProgress {
    fn progress(&self, _message: &str) {}
}

/// Shared state for one run
#[derive(Clone)]
pub struct ExecutionContext {
    /// Logger span entered for every procedure
    pub span: tracing::Span,
    /// Progress sink
    pub progress: Arc<dyn Progress>,
    /// Collaborator clients
    pub clients: Clients,
    /// Scratch directory
    pub workdir: PathBuf,
    /// Plan being executed
    pub plan: Arc<Plan>,
    /// Update tunables
    pub config: UpdateConfig,
}

impl ExecutionContext {
    /// Create context with stdout progress and default config
    #[must_use]
    pub fn new(clients: Clients, plan: Plan) -> Self {
        Self {
            span: tracing::info_span!("sdcadm"),
            progress: Arc::new(StdoutProgress),
            clients,
            workdir: std::env::temp_dir(),
            plan: Arc::new(plan),
            config: UpdateConfig::default(),
        }
    }

    /// With progress sink
    #[inline]
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// With update config
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: UpdateConfig) -> Self {
        self.config = config;
        self
    }

    /// With scratch directory
    #[inline]
    #[must_use]
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    /// With logger span
    #[inline]
    #[must_use]
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Emit a progress line
    #[inline]
    pub fn progress(&self, message: impl AsRef<str>) {
        self.progress.progress(message.as_ref());
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("workdir", &self.workdir)
            .field("changes", &self.plan.changes.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
