//! CLI command implementations

pub mod class_info;
pub mod observe;
pub mod push;
pub mod rate_limits;
