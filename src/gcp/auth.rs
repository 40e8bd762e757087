//! GCP Authentication
//!
//! Resolves the project and credentials a Cloud Run client should use, and
//! turns them into an authenticated session via service account keys or
//! Application Default Credentials (ADC).

use super::error::{Error, Result};
use crate::config::{ClientOptions, Environment};
use anyhow::Context;
use async_trait::async_trait;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use gcp_auth::TokenProvider;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default scopes for GCP API access
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if we can't determine expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Standard alphabet, tolerant of missing padding
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// =========================================================================
// Resolution
// =========================================================================

/// Where the resolved project id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectSource {
    /// The `project_id` option
    Explicit,
    /// `project_id` inside the service account key
    Credentials,
    /// `$GCLOUD_PROJECT`
    Environment,
}

/// Fields of a service account key file this crate looks at
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsFile {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub client_email: Option<String>,
}

/// Parsed credentials plus the decoded JSON text handed to the token provider
#[derive(Clone)]
pub struct ParsedCredentials {
    pub file: CredentialsFile,
    json: String,
}

impl ParsedCredentials {
    /// Decoded JSON key text
    pub fn json(&self) -> &str {
        &self.json
    }
}

/// Project, namespace and endpoint a Cloud Run client talks to
#[derive(Clone)]
pub struct ResolvedIdentity {
    pub project_id: String,
    pub project_source: ProjectSource,
    pub region: String,
    /// `namespaces/<project_id>`
    pub parent: String,
    /// `https://<region>-run.googleapis.com`
    pub endpoint: String,
    credentials: Option<ParsedCredentials>,
}

impl ResolvedIdentity {
    /// Service account key supplied through the options, if any
    pub fn credentials(&self) -> Option<&ParsedCredentials> {
        self.credentials.as_ref()
    }

    /// Point the client at a different API root
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for ResolvedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedIdentity")
            .field("project_id", &self.project_id)
            .field("project_source", &self.project_source)
            .field("region", &self.region)
            .field("parent", &self.parent)
            .field("endpoint", &self.endpoint)
            .field(
                "client_email",
                &self.credentials.as_ref().and_then(|c| c.file.client_email.as_deref()),
            )
            .finish()
    }
}

/// Inputs each project layer can look at
struct ProjectInputs<'a> {
    options: &'a ClientOptions,
    credentials: Option<&'a CredentialsFile>,
    env: &'a Environment,
}

type ProjectLayer = fn(&ProjectInputs<'_>) -> Option<String>;

/// Project id sources, highest priority first
const PROJECT_LAYERS: &[(ProjectSource, ProjectLayer)] = &[
    (ProjectSource::Explicit, explicit_project),
    (ProjectSource::Credentials, credentials_project),
    (ProjectSource::Environment, environment_project),
];

fn explicit_project(inputs: &ProjectInputs<'_>) -> Option<String> {
    inputs.options.project_id().map(str::to_string)
}

fn credentials_project(inputs: &ProjectInputs<'_>) -> Option<String> {
    inputs
        .credentials
        .and_then(|c| c.project_id.as_deref())
        .filter(|p| !p.trim().is_empty())
        .map(str::to_string)
}

fn environment_project(inputs: &ProjectInputs<'_>) -> Option<String> {
    inputs.env.default_project().map(str::to_string)
}

/// Resolve the identity for a region from the options and environment
pub fn resolve(region: &str, options: &ClientOptions, env: &Environment) -> Result<ResolvedIdentity> {
    let region = region.trim();
    if region.is_empty() {
        return Err(Error::MissingInput("region"));
    }

    if options.credentials().is_none() && !env.has_default_credentials() {
        return Err(Error::AuthenticationUnavailable);
    }

    let credentials = options.credentials().map(parse_credentials).transpose()?;

    let inputs = ProjectInputs {
        options,
        credentials: credentials.as_ref().map(|c| &c.file),
        env,
    };
    let (project_source, project_id) = PROJECT_LAYERS
        .iter()
        .find_map(|(source, layer)| layer(&inputs).map(|project| (*source, project)))
        .ok_or(Error::ProjectIdNotFound)?;

    match project_source {
        ProjectSource::Explicit => tracing::debug!("Using project Id from input"),
        ProjectSource::Credentials => tracing::info!("Setting project Id from credentials"),
        ProjectSource::Environment => tracing::info!("Setting project Id from $GCLOUD_PROJECT"),
    }
    if !validate_project_id(&project_id) {
        tracing::warn!("Project Id {:?} does not look like a GCP project Id", project_id);
    }

    Ok(ResolvedIdentity {
        parent: format!("namespaces/{}", project_id),
        endpoint: format!("https://{}-run.googleapis.com", region),
        region: region.to_string(),
        project_id,
        project_source,
        credentials,
    })
}

/// Parse credentials given either as raw JSON or as base64-encoded JSON
pub fn parse_credentials(raw: &str) -> Result<ParsedCredentials> {
    let trimmed = raw.trim();
    let json = if trimmed.starts_with('{') {
        trimmed.to_string()
    } else {
        let compact: String = trimmed.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = LENIENT_BASE64.decode(compact).map_err(Error::credential_parse)?;
        String::from_utf8(bytes).map_err(Error::credential_parse)?
    };

    let file = serde_json::from_str::<CredentialsFile>(&json).map_err(Error::credential_parse)?;
    Ok(ParsedCredentials { file, json })
}

/// Validate a GCP project ID format
/// Project IDs must be 6-30 characters, lowercase letters, digits, and hyphens
/// Must start with a letter and cannot end with a hyphen
fn validate_project_id(project: &str) -> bool {
    if project.len() < 6 || project.len() > 30 {
        return false;
    }

    match project.chars().next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }

    if project.ends_with('-') {
        return false;
    }

    project
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

// =========================================================================
// Sessions
// =========================================================================

/// Something that can hand out bearer tokens for API calls
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> anyhow::Result<String>;
}

/// Establishes an authenticated session with Google Cloud
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn connect(&self) -> anyhow::Result<AuthenticatedHandle>;
}

/// An established session; clones share the same token source
#[derive(Clone)]
pub struct AuthenticatedHandle {
    source: Arc<dyn TokenSource>,
}

impl AuthenticatedHandle {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self { source }
    }

    /// Get an access token for API calls
    pub async fn access_token(&self) -> anyhow::Result<String> {
        self.source.access_token().await
    }

    /// Whether both handles belong to the same session
    pub fn same_session(&self, other: &AuthenticatedHandle) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
    }
}

impl std::fmt::Debug for AuthenticatedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthenticatedHandle(..)")
    }
}

/// GCP credentials holder with token caching
pub struct GcpCredentials {
    provider: Arc<dyn TokenProvider>,
    token_cache: RwLock<Option<CachedToken>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl GcpCredentials {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            token_cache: RwLock::new(None),
        }
    }
}

#[async_trait]
impl TokenSource for GcpCredentials {
    /// Security: Checks token expiry before returning cached token
    async fn access_token(&self) -> anyhow::Result<String> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = self
            .provider
            .token(DEFAULT_SCOPES)
            .await
            .context("Failed to get access token")?;
        let token_str = token.as_str().to_string();

        // Use a conservative default TTL
        let expires_at = Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;
        *self.token_cache.write().await = Some(CachedToken {
            token: token_str.clone(),
            expires_at,
        });

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            (DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(token_str)
    }
}

/// Default provider: the supplied service account key, otherwise ADC
pub struct GcpIdentityProvider {
    credentials_json: Option<String>,
}

impl GcpIdentityProvider {
    pub fn new(identity: &ResolvedIdentity) -> Self {
        Self {
            credentials_json: identity.credentials().map(|c| c.json().to_string()),
        }
    }
}

#[async_trait]
impl IdentityProvider for GcpIdentityProvider {
    async fn connect(&self) -> anyhow::Result<AuthenticatedHandle> {
        let provider: Arc<dyn TokenProvider> = match &self.credentials_json {
            Some(json) => {
                tracing::debug!("Authenticating with supplied service account key");
                let account = gcp_auth::CustomServiceAccount::from_json(json)
                    .context("Failed to load service account key")?;
                Arc::new(account)
            }
            None => {
                tracing::debug!("Authenticating with Application Default Credentials");
                gcp_auth::provider().await.context(
                    "Failed to initialize GCP authentication. Run 'gcloud auth application-default login'",
                )?
            }
        };

        Ok(AuthenticatedHandle::new(Arc::new(GcpCredentials::new(provider))))
    }
}
