//! Procedure contract
//!
//! A procedure describes one kind of change: it can summarize itself for
//! operator confirmation and execute itself against a shared context.

use crate::context::ExecutionContext;
use crate::error::UpgradeError;
use async_trait::async_trait;
use tracing::Instrument;

/// Pluggable update procedure
#[async_trait]
pub trait Procedure: Send + Sync + std::fmt::Debug {
    /// Human-readable description of what `execute` will do.
    ///
    /// Pure: derived from the procedure's own change data only.
    fn summarize(&self) -> String;

    /// Perform the change.
    ///
    /// Every dispatched remote task is resolved, as success or as a
    /// recorded failure, before this returns.
    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), UpgradeError>;
}

/// Summaries of several procedures, one per line group
#[must_use]
pub fn summarize_all(procs: &[Box<dyn Procedure>]) -> String {
    procs
        .iter()
        .map(|p| p.summarize())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run procedures in order, stopping at the first error
///
/// # Errors
/// - the first error returned by a procedure
pub async fn run_procedures(
    procs: &[Box<dyn Procedure>],
    ctx: &ExecutionContext,
) -> Result<(), UpgradeError> {
    for (idx, procedure) in procs.iter().enumerate() {
        tracing::debug!(step = idx + 1, total = procs.len(), "running procedure");
        procedure
            .execute(ctx)
            .instrument(ctx.span.clone())
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{Clients, MockCnapiClient, MockInventoryClient};
    use crate::types::Plan;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Recorder {
        name: &'static str,
        fail: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Procedure for Recorder {
        fn summarize(&self) -> String {
            format!("run {}", self.name)
        }

        async fn execute(&self, _ctx: &ExecutionContext) -> Result<(), UpgradeError> {
            self.log.lock().push(self.name);
            if self.fail {
                Err(UpgradeError::update(format!("{} failed", self.name)))
            } else {
                Ok(())
            }
        }
    }

    fn ctx() -> ExecutionContext {
        let clients = Clients::new(
            Arc::new(MockInventoryClient::new()),
            Arc::new(MockCnapiClient::new()),
        );
        ExecutionContext::new(clients, Plan::default())
            .with_progress(Arc::new(crate::context::NoopProgress))
    }

    fn procs(fails: &[bool], log: &Arc<Mutex<Vec<&'static str>>>) -> Vec<Box<dyn Procedure>> {
        const NAMES: [&str; 3] = ["first", "second", "third"];
        fails
            .iter()
            .zip(NAMES)
            .map(|(&fail, name)| {
                Box::new(Recorder {
                    name,
                    fail,
                    log: Arc::clone(log),
                }) as Box<dyn Procedure>
            })
            .collect()
    }

    #[tokio::test]
    async fn runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let procs = procs(&[false, false, false], &log);

        run_procedures(&procs, &ctx()).await.unwrap();
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
        assert_eq!(summarize_all(&procs), "run first\nrun second\nrun third");
    }

    #[tokio::test]
    async fn stops_at_first_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let procs = procs(&[false, true, false], &log);

        let err = run_procedures(&procs, &ctx()).await.unwrap_err();
        assert_eq!(err.message(), "second failed");
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }
}
