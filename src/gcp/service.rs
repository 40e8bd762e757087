//! Cloud Run Services
//!
//! The knative `Service` document returned by the Cloud Run admin API.
//! Only the parts this tool reads are modelled; everything else is ignored.

use serde::Deserialize;
use std::collections::HashMap;

/// Annotation holding the image the service was deployed with
pub const USER_IMAGE_ANNOTATION: &str = "client.knative.dev/user-image";

/// A Cloud Run service
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: Option<ObjectMeta>,
    #[serde(default)]
    pub status: Option<ServiceStatus>,
}

/// Service metadata
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub generation: Option<i64>,
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
    #[serde(default)]
    pub annotations: Option<HashMap<String, String>>,
}

/// Observed state of the service
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub latest_ready_revision_name: Option<String>,
    #[serde(default)]
    pub latest_created_revision_name: Option<String>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl Service {
    /// The deployed image, if the service carries the user-image annotation
    pub fn user_image(&self) -> Option<&str> {
        self.metadata
            .as_ref()?
            .annotations
            .as_ref()?
            .get(USER_IMAGE_ANNOTATION)
            .map(String::as_str)
    }
}
