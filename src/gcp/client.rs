//! Cloud Run Client
//!
//! Holds a resolved identity, lazily establishes an authenticated session,
//! and reads services from the Cloud Run admin API.

use super::auth::{AuthenticatedHandle, GcpIdentityProvider, IdentityProvider, ResolvedIdentity};
use super::error::{Error, Result};
use super::http::GcpHttpClient;
use super::service::Service;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Path prefix of the knative serving API
const SERVING_API_PATH: &str = "apis/serving.knative.dev/v1";

/// Session lifecycle. The lock around it being held means "authenticating".
enum AuthState {
    Unauthenticated,
    Authenticated(AuthenticatedHandle),
    /// Last attempt failed; the next call tries again
    Failed(String),
}

/// Client for one region/project of the Cloud Run admin API
pub struct CloudRunClient {
    identity: ResolvedIdentity,
    provider: Arc<dyn IdentityProvider>,
    http: GcpHttpClient,
    auth: Mutex<AuthState>,
}

impl CloudRunClient {
    /// Create a client that authenticates through `provider`
    pub fn new(identity: ResolvedIdentity, provider: Arc<dyn IdentityProvider>) -> Result<Self> {
        Ok(Self {
            identity,
            provider,
            http: GcpHttpClient::new()?,
            auth: Mutex::new(AuthState::Unauthenticated),
        })
    }

    /// Create a client using the identity's key, or ADC when it has none
    pub fn from_identity(identity: ResolvedIdentity) -> Result<Self> {
        let provider = Arc::new(GcpIdentityProvider::new(&identity));
        Self::new(identity, provider)
    }

    pub fn identity(&self) -> &ResolvedIdentity {
        &self.identity
    }

    /// `namespaces/<project>`
    pub fn parent(&self) -> &str {
        &self.identity.parent
    }

    /// API root, `https://<region>-run.googleapis.com` unless overridden
    pub fn endpoint(&self) -> &str {
        &self.identity.endpoint
    }

    /// Whether a session is currently cached
    pub async fn is_authenticated(&self) -> bool {
        matches!(*self.auth.lock().await, AuthState::Authenticated(_))
    }

    /// Return the cached session, establishing it on first use
    pub async fn ensure_authenticated(&self) -> Result<AuthenticatedHandle> {
        let mut state = self.auth.lock().await;

        match &*state {
            AuthState::Authenticated(handle) => return Ok(handle.clone()),
            AuthState::Failed(reason) => {
                tracing::debug!("Retrying authentication after earlier failure: {}", reason);
            }
            AuthState::Unauthenticated => tracing::debug!("Authenticating"),
        }

        match self.provider.connect().await {
            Ok(handle) => {
                tracing::debug!("Authenticated for project {}", self.identity.project_id);
                *state = AuthState::Authenticated(handle.clone());
                Ok(handle)
            }
            Err(e) => {
                tracing::warn!("Authentication failed: {:#}", e);
                *state = AuthState::Failed(format!("{:#}", e));
                Err(Error::authentication_failed(e))
            }
        }
    }

    /// `<parent>/services/<service_name>`
    pub fn build_resource_path(&self, service_name: &str) -> Result<String> {
        if service_name.is_empty() {
            return Err(Error::MissingInput("name"));
        }
        Ok(format!("{}/services/{}", self.identity.parent, service_name))
    }

    /// Full URL of a service in the serving API, with the name percent-encoded
    pub fn service_url(&self, service_name: &str) -> Result<String> {
        if service_name.is_empty() {
            return Err(Error::MissingInput("name"));
        }
        Ok(format!(
            "{}/{}/{}/services/{}",
            self.identity.endpoint,
            SERVING_API_PATH,
            self.identity.parent,
            urlencoding::encode(service_name)
        ))
    }

    /// Fetch a service document
    pub async fn get_service(&self, service_name: &str) -> Result<Service> {
        let url = self.service_url(service_name)?;
        let handle = self.ensure_authenticated().await?;
        let token = handle
            .access_token()
            .await
            .map_err(Error::authentication_failed)?;

        self.http.get(&url, &token).await
    }

    /// The image a service is running, `None` when it is not annotated
    pub async fn get_service_image(&self, service_name: &str) -> Result<Option<String>> {
        let service = self.get_service(service_name).await?;

        let image = service.user_image().map(str::to_string);
        match &image {
            Some(image) => tracing::info!("Service {} runs {}", service_name, image),
            None => tracing::info!("Service {} has no image annotation", service_name),
        }
        if let Some(url) = service.status.as_ref().and_then(|s| s.url.as_deref()) {
            tracing::debug!("Service {} is served at {}", service_name, url);
        }

        Ok(image)
    }
}
