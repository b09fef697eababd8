//! Agent update procedure
//!
//! Installs a new agent image on every targeted server:
//! 1. Check that CNAPI is new enough to install agents through tasks
//! 2. Fan out one install per server through a bounded [`WorkQueue`]
//! 3. Poll each install to completion
//! 4. Report every per-server failure together as one `MultiError`
//!
//! Changes run one after another in plan order. Concurrency only applies
//! within a change.

use crate::clients::CnapiClient;
use crate::config::UpdateConfig;
use crate::context::{ExecutionContext, Progress};
use crate::error::UpgradeError;
use crate::poll::{wait_for_agent_image, wait_for_task};
use crate::procedure::Procedure;
use crate::queue::{FailureCollector, WorkQueue};
use crate::types::{Change, Image, Instance, Service, ServiceKind, CNAPI, CN_AGENT};
use crate::version::{build_timestamp, Version};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::Instrument;

/// Server ids are listed in summaries up to this many servers
const SUMMARY_SERVER_LIMIT: usize = 5;

/// Installs agent images across servers
#[derive(Debug, Clone)]
pub struct UpdateAgentProcedure {
    changes: Vec<Change>,
}

impl UpdateAgentProcedure {
    /// Create procedure for agent changes
    ///
    /// # Errors
    /// - `UpgradeError::Usage` if a change is not for an agent service or
    ///   targets no instances
    pub fn new(changes: Vec<Change>) -> Result<Self, UpgradeError> {
        if changes.is_empty() {
            return Err(UpgradeError::usage("agent update needs at least one change"));
        }
        for change in &changes {
            if change.service.kind != ServiceKind::Agent {
                return Err(UpgradeError::usage(format!(
                    "\"{}\" is not an agent service",
                    change.service
                )));
            }
            if change.insts.is_empty() {
                return Err(UpgradeError::usage(format!(
                    "change for \"{}\" targets no servers",
                    change.service
                )));
            }
        }
        Ok(Self { changes })
    }

    /// Planned changes
    #[inline]
    #[must_use]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    async fn update_change(
        &self,
        ctx: &ExecutionContext,
        change: &Change,
    ) -> Result<(), UpgradeError> {
        let agent_versions = check_fleet_compat(ctx).await?;
        let min_agent = Version::parse(&ctx.config.min_cn_agent_version).ok_or_else(|| {
            UpgradeError::usage(format!(
                "invalid minimum cn-agent version: {}",
                ctx.config.min_cn_agent_version
            ))
        })?;

        let total = change.insts.len();
        ctx.progress(format!(
            "Updating {} to {} on {total} server(s), {} at a time",
            change.service,
            image_label(&change.image),
            ctx.config.concurrency.min(total)
        ));

        let failures = FailureCollector::new();
        let installer = Arc::new(Installer {
            cnapi: Arc::clone(&ctx.clients.cnapi),
            progress: Arc::clone(&ctx.progress),
            config: ctx.config.clone(),
            service: change.service.clone(),
            agent_versions,
            min_agent,
            failures: failures.clone(),
            span: tracing::Span::current(),
        });

        let queue = WorkQueue::new(ctx.config.concurrency, move |inst: Instance| {
            let installer = Arc::clone(&installer);
            let span = installer.span.clone();
            async move { installer.run(inst).await }.instrument(span)
        })?;
        queue.push_all(change.insts.iter().cloned())?;
        if let Err(err) = queue.drained().await {
            failures.record(err);
        }

        let failed = failures.len();
        match failures.into_result() {
            Ok(()) => {
                tracing::info!(service = %change.service, servers = total, "change complete");
                ctx.progress(format!("Updated {} on {total} server(s)", change.service));
                Ok(())
            }
            Err(err) => {
                tracing::error!(
                    service = %change.service,
                    failed,
                    servers = total,
                    "change failed"
                );
                ctx.progress(format!(
                    "Failed to update {} on {failed} of {total} server(s)",
                    change.service
                ));
                Err(err)
            }
        }
    }
}

#[async_trait]
impl Procedure for UpdateAgentProcedure {
    fn summarize(&self) -> String {
        let mut out = String::new();
        for (idx, change) in self.changes.iter().enumerate() {
            if idx > 0 {
                out.push('\n');
            }
            let servers: Vec<&str> = change.insts.iter().map(|i| i.server.as_str()).collect();
            let _ = write!(
                out,
                "update \"{}\" to image {}\n    on {} server(s)",
                change.service,
                image_label(&change.image),
                servers.len()
            );
            if servers.len() <= SUMMARY_SERVER_LIMIT {
                let _ = write!(out, ": {}", servers.join(", "));
            }
        }
        out
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), UpgradeError> {
        for change in &self.changes {
            let span = tracing::info_span!(
                "update_agent",
                service = %change.service,
                image = %change.image.uuid
            );
            self.update_change(ctx, change).instrument(span).await?;
        }
        Ok(())
    }
}

/// State shared by the install workers of one change
struct Installer {
    cnapi: Arc<dyn CnapiClient>,
    progress: Arc<dyn Progress>,
    config: UpdateConfig,
    service: Service,
    agent_versions: HashMap<String, Option<String>>,
    min_agent: Version,
    failures: FailureCollector,
    span: tracing::Span,
}

impl Installer {
    async fn run(&self, inst: Instance) {
        match self.install(&inst).await {
            Ok(()) => {
                tracing::info!(server = %inst.server, "agent installed");
                self.progress.progress(&format!(
                    "Updated {} on server {}",
                    self.service, inst.server
                ));
            }
            Err(err) => {
                tracing::warn!(server = %inst.server, error = %err, "agent install failed");
                self.failures.record(err);
            }
        }
    }

    async fn install(&self, inst: &Instance) -> Result<(), UpgradeError> {
        let server = inst.server.as_str();
        let image = inst.image.as_ref().ok_or_else(|| {
            UpgradeError::update(format!(
                "no target image resolved for {} on server {server}",
                self.service
            ))
        })?;

        let agent_version = self
            .agent_versions
            .get(server)
            .and_then(Option::as_deref)
            .ok_or_else(|| {
                UpgradeError::update(format!("{CN_AGENT} version unknown on server {server}"))
            })?;
        let parsed = Version::parse(agent_version).ok_or_else(|| {
            UpgradeError::update(format!(
                "cannot parse {CN_AGENT} version \"{agent_version}\" on server {server}"
            ))
        })?;
        if !parsed.satisfies_min(&self.min_agent) {
            return Err(UpgradeError::update(format!(
                "server {server}: {CN_AGENT} {agent_version} is older than {}, \
                 the minimum able to install agents",
                self.min_agent
            )));
        }

        self.progress.progress(&format!(
            "Installing {} image {} on server {server}",
            self.service,
            image_label(image)
        ));
        let task = self
            .cnapi
            .post_install_agent_task(server, &image.uuid)
            .await
            .map_err(|e| UpgradeError::sdc_client("cnapi", e))?;
        tracing::debug!(server, task = %task, "install task dispatched");

        if self.service.is_node_agent() {
            // The install restarts cn-agent itself, so the task never reports back.
            wait_for_agent_image(
                self.cnapi.as_ref(),
                server,
                &self.service.name,
                &image.uuid,
                &self.config.poll,
            )
            .await?;
        } else {
            wait_for_task(self.cnapi.as_ref(), &task, &self.config.poll).await?;
        }
        Ok(())
    }
}

/// Check CNAPI compatibility; returns cn-agent versions by server
async fn check_fleet_compat(
    ctx: &ExecutionContext,
) -> Result<HashMap<String, Option<String>>, UpgradeError> {
    let services = [CNAPI.to_string(), CN_AGENT.to_string()];
    let insts = ctx
        .clients
        .inventory
        .list_instances(&services)
        .await
        .map_err(|e| UpgradeError::sdc_client("inventory", e))?;

    let min_build = ctx.config.min_cnapi_build.as_str();
    let mut cnapi_seen = 0usize;
    let mut agent_versions = HashMap::new();

    for inst in insts {
        if inst.service == CNAPI {
            cnapi_seen += 1;
            let version = inst.version.as_deref().ok_or_else(|| {
                UpgradeError::update(format!(
                    "{CNAPI} instance on server {} reports no version",
                    inst.server
                ))
            })?;
            let stamp = build_timestamp(version).ok_or_else(|| {
                UpgradeError::update(format!(
                    "cannot read build timestamp from {CNAPI} version \"{version}\""
                ))
            })?;
            if stamp < min_build {
                return Err(UpgradeError::update(format!(
                    "{CNAPI} image build {stamp} is older than {min_build}; \
                     update {CNAPI} before updating agents"
                )));
            }
            tracing::debug!(version, "cnapi build is compatible");
        } else if inst.service == CN_AGENT {
            agent_versions.insert(inst.server, inst.version);
        }
    }

    if cnapi_seen == 0 {
        return Err(UpgradeError::update(format!("no {CNAPI} instances found")));
    }
    Ok(agent_versions)
}

fn image_label(image: &Image) -> String {
    if image.name.is_empty() {
        format!("{} ({})", image.uuid, image.version)
    } else {
        format!("{} ({}@{})", image.uuid, image.name, image.version)
    }
}
