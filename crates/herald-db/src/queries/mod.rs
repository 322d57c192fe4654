pub mod deploy_log;
pub mod endpoints;
pub mod locks;
pub mod plans;
