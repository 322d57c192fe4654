//! Error taxonomy for plan loading and deployment.
//!
//! Structural problems ([`DeployError::MalformedPlan`]) and lock contention
//! ([`DeployError::AlreadyRunning`]) are detected before a run starts and
//! leave no trace. Plan errors and plugin errors happen inside a run and are
//! returned only after the lock is released and the failure is logged.

use std::fmt;

/// Why a plan cannot be loaded or deployed as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// No processor plugin is configured (or it could not be materialized).
    NoProcessor,
    /// The plan is marked fetch-only: it may gather but never push.
    FetchOnly,
    /// The plan targets no endpoints.
    NoEndpoints,
    /// Entities were requested but no aggregator plugin is configured.
    NoAggregator,
    /// The aggregator plugin id is not registered.
    UnknownAggregator(String),
    /// The processor plugin id is not registered.
    UnknownProcessor(String),
    /// A stored field could not be deserialized.
    InvalidField { field: String, message: String },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoProcessor => f.write_str("no processor is configured"),
            Self::FetchOnly => f.write_str("plan is fetch-only"),
            Self::NoEndpoints => f.write_str("no endpoints are configured"),
            Self::NoAggregator => f.write_str("no aggregator is configured"),
            Self::UnknownAggregator(id) => write!(f, "unknown aggregator plugin {id:?}"),
            Self::UnknownProcessor(id) => write!(f, "unknown processor plugin {id:?}"),
            Self::InvalidField { field, message } => {
                write!(f, "field {field:?} is not valid: {message}")
            }
        }
    }
}

/// Errors returned by [`crate::Plan::load`] and [`crate::Plan::deploy`].
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("plan {plan:?} is malformed: {reason}")]
    MalformedPlan { plan: String, reason: MalformedReason },

    #[error("plan {plan:?} is already being deployed")]
    AlreadyRunning { plan: String },

    #[error("plan {plan:?} references endpoint {endpoint:?}, which is not usable")]
    InvalidEndpoint { plan: String, endpoint: String },

    #[error("plan {plan:?}: no endpoint is selected")]
    NoEndpointSelected { plan: String },

    /// Raised by a collaborator (plugin, log, lock, resolver) and passed
    /// through unchanged.
    #[error(transparent)]
    Plugin(#[from] anyhow::Error),
}

/// Coarse classification of a [`DeployError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedPlan,
    AlreadyRunning,
    PlanError,
    Plugin,
}

impl DeployError {
    pub(crate) fn malformed(plan: &str, reason: MalformedReason) -> Self {
        Self::MalformedPlan {
            plan: plan.to_string(),
            reason,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedPlan { .. } => ErrorKind::MalformedPlan,
            Self::AlreadyRunning { .. } => ErrorKind::AlreadyRunning,
            Self::InvalidEndpoint { .. } | Self::NoEndpointSelected { .. } => ErrorKind::PlanError,
            Self::Plugin(_) => ErrorKind::Plugin,
        }
    }

    /// The plan the error is about, when the variant records it.
    pub fn plan_name(&self) -> Option<&str> {
        match self {
            Self::MalformedPlan { plan, .. }
            | Self::AlreadyRunning { plan }
            | Self::InvalidEndpoint { plan, .. }
            | Self::NoEndpointSelected { plan } => Some(plan),
            Self::Plugin(_) => None,
        }
    }

    /// The endpoint the error is about, for endpoint-specific plan errors.
    pub fn endpoint_name(&self) -> Option<&str> {
        match self {
            Self::InvalidEndpoint { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }
}
