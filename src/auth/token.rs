//! Token secrets and the token set held by the lifecycle manager.

pub mod secret;
pub mod set;
