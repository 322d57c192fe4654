//! The deployment protocol.
//!
//! Preconditions are checked before the lock is taken and leave no trace.
//! Once the lock is held, every exit path releases it exactly once; failures
//! are then logged as `failed` against the run's deployment id.

use tracing::{info, warn};
use uuid::Uuid;

use super::Plan;
use crate::deploy_log::{DeploymentLog, DeploymentStatus};
use crate::endpoint::{Endpoint, EndpointLookup, EndpointResolver};
use crate::error::{DeployError, MalformedReason};
use crate::lock::LockService;
use crate::operations::{HookPoint, OperationRegistry};
use crate::processor::Processor;

/// Collaborators a deployment run talks to.
#[derive(Clone, Copy)]
pub struct DeployContext<'a> {
    pub resolver: &'a dyn EndpointResolver,
    pub log: &'a dyn DeploymentLog,
    pub locks: &'a dyn LockService,
    pub operations: &'a OperationRegistry,
}

impl Plan {
    /// Deploy this plan to every configured endpoint, then publish to every
    /// resolved endpoint.
    ///
    /// Returns the deployment id of the completed run.
    ///
    /// # Errors
    ///
    /// - [`DeployError::MalformedPlan`] when there is no processor, the plan
    ///   is fetch-only, or no endpoints are configured. Nothing is locked or
    ///   logged.
    /// - [`DeployError::AlreadyRunning`] when another run holds the lock.
    /// - [`DeployError::InvalidEndpoint`] and
    ///   [`DeployError::NoEndpointSelected`] for endpoint problems found
    ///   during the run.
    /// - [`DeployError::Plugin`] for anything a collaborator raises.
    pub async fn deploy(&mut self, ctx: &DeployContext<'_>) -> Result<Uuid, DeployError> {
        if self.processor.is_none() || !self.endpoints.is_native() {
            self.load()?;
        }
        let Some(processor) = self.processor.as_deref() else {
            return Err(DeployError::malformed(&self.name, MalformedReason::NoProcessor));
        };
        if self.fetch_only {
            return Err(DeployError::malformed(&self.name, MalformedReason::FetchOnly));
        }
        let endpoints = self.endpoint_names();
        if endpoints.is_empty() {
            return Err(DeployError::malformed(&self.name, MalformedReason::NoEndpoints));
        }

        let lock_name = self.lock_name();
        if !ctx.locks.try_acquire(&lock_name).await? {
            return Err(DeployError::AlreadyRunning {
                plan: self.name.clone(),
            });
        }

        let run = Run {
            plan: &self.name,
            processor,
            lock_name: &lock_name,
            ctx,
        };
        let mut deployment_id = None;
        let outcome = run.execute(endpoints, &mut deployment_id).await;
        let released = ctx.locks.release(&lock_name).await;

        match (outcome, released) {
            (Ok(id), Ok(())) => {
                info!(plan = %self.name, deployment_id = %id, "deployment complete");
                Ok(id)
            }
            (Ok(id), Err(err)) => {
                let err = DeployError::Plugin(
                    err.context(format!("failed to release lock {lock_name:?}")),
                );
                record_failure(ctx.log, &self.name, Some(id), &err).await;
                Err(err)
            }
            (Err(err), released) => {
                if let Err(release_err) = released {
                    warn!(
                        plan = %self.name,
                        lock = %lock_name,
                        error = %format!("{release_err:#}"),
                        "failed to release lock after failed deployment"
                    );
                }
                record_failure(ctx.log, &self.name, deployment_id, &err).await;
                Err(err)
            }
        }
    }
}

/// One locked run of a plan.
struct Run<'a> {
    plan: &'a str,
    processor: &'a dyn Processor,
    lock_name: &'a str,
    ctx: &'a DeployContext<'a>,
}

impl Run<'_> {
    /// Everything between acquiring and releasing the lock. The deployment
    /// id is stored in `deployment_id` as soon as it exists so failures can
    /// be logged against it.
    async fn execute(
        &self,
        endpoints: &[String],
        deployment_id: &mut Option<Uuid>,
    ) -> Result<Uuid, DeployError> {
        let ctx = self.ctx;
        let id = ctx.log.start(self.plan, DeploymentStatus::Started).await?;
        *deployment_id = Some(id);
        info!(plan = %self.plan, deployment_id = %id, "deployment started");

        self.processor
            .pre_process(ctx.operations.handlers(HookPoint::PreProcess))
            .await?;
        ctx.log.record(id, DeploymentStatus::Processing, None).await?;

        let resolved = self.deploy_pass(id, endpoints).await?;

        for endpoint in &resolved {
            self.processor.publish(id, endpoint, self.lock_name).await?;
            info!(plan = %self.plan, deployment_id = %id, endpoint = %endpoint.name, "published");
        }

        self.processor
            .post_process(ctx.operations.handlers(HookPoint::PostProcess))
            .await?;
        Ok(id)
    }

    /// Resolve each endpoint name and deploy to it right away. Returns the
    /// resolved endpoints in configured order.
    async fn deploy_pass(&self, id: Uuid, names: &[String]) -> Result<Vec<Endpoint>, DeployError> {
        let mut resolved = Vec::with_capacity(names.len());
        let mut unselected = false;

        for name in names {
            match self.ctx.resolver.resolve(name).await? {
                EndpointLookup::Found(endpoint) => {
                    self.processor.deploy(id, &endpoint, self.lock_name).await?;
                    info!(plan = %self.plan, deployment_id = %id, endpoint = %endpoint.name, "deployed");
                    resolved.push(endpoint);
                }
                EndpointLookup::InvalidReference => {
                    return Err(DeployError::InvalidEndpoint {
                        plan: self.plan.to_string(),
                        endpoint: name.clone(),
                    });
                }
                EndpointLookup::NotFound => {
                    warn!(plan = %self.plan, deployment_id = %id, endpoint = %name, "endpoint not selected");
                    unselected = true;
                }
            }
        }

        if resolved.is_empty() && unselected {
            return Err(DeployError::NoEndpointSelected {
                plan: self.plan.to_string(),
            });
        }
        Ok(resolved)
    }
}

/// Best-effort `failed` entry for a run that errored after taking the lock.
async fn record_failure(
    log: &dyn DeploymentLog,
    plan: &str,
    deployment_id: Option<Uuid>,
    err: &DeployError,
) {
    let message = format!("{err:#}");
    let Some(id) = deployment_id else {
        warn!(plan = %plan, error = %message, "deployment failed before it was logged");
        return;
    };
    warn!(plan = %plan, deployment_id = %id, error = %message, "deployment failed");
    if let Err(log_err) = log.record(id, DeploymentStatus::Failed, Some(&message)).await {
        warn!(
            plan = %plan,
            deployment_id = %id,
            error = %format!("{log_err:#}"),
            "failed to record deployment failure"
        );
    }
}
