//! HTTP handlers for profile-service.

pub mod metrics;
pub mod profile;

pub use profile::{private_read_v3, private_read_v4, read_v3, read_v4};
