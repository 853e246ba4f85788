//! API Gateway (dedicated) v2
//!
//! Every resource lives below `instances/{instance_id}` of the gateway
//! instance that owns it.

pub mod env_variables;
pub mod environments;
pub mod groups;

/// Page size used when listing
pub const PAGE_LIMIT: usize = 500;
