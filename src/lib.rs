//! Resolve Google Cloud credentials and report the container image a Cloud
//! Run service is currently running.

pub mod action;
pub mod config;
pub mod gcp;

/// Version injected at compile time via CLOUD_RUN_IMAGE_VERSION env var (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("CLOUD_RUN_IMAGE_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
