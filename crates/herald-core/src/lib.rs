//! Plan lifecycle and deployment orchestration.
//!
//! A [`plan::Plan`] names what to deploy (an [`aggregator::Aggregator`]),
//! how to push it (a [`processor::Processor`]) and where (endpoint names
//! resolved by an [`endpoint::EndpointResolver`]). [`plan::Plan::deploy`]
//! drives one run under a per-plan lock:
//!
//! ```text
//! load plugins -> try-acquire "deploy_plan_<name>"
//!   -> log started -> pre-process -> log processing
//!   -> deploy(e1) .. deploy(en) -> publish(e1) .. publish(en)
//!   -> post-process -> release
//! on error: release -> log failed -> return the error
//! ```

pub mod aggregator;
pub mod deploy_log;
pub mod endpoint;
pub mod error;
pub mod lock;
pub mod operations;
pub mod plan;
pub mod plugin;
pub mod postgres;
pub mod processor;

pub use error::{DeployError, ErrorKind, MalformedReason};
pub use plan::{DeployContext, Plan};
