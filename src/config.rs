//! Configuration Management
//!
//! Client options supplied by the caller and the environment snapshot that
//! credential resolution falls back to.

/// Environment variable holding the default project (set by setup-gcloud)
pub const DEFAULT_PROJECT_VAR: &str = "GCLOUD_PROJECT";

/// Environment variable pointing at an Application Default Credentials file
pub const CREDENTIALS_PATH_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Options for building a Cloud Run client
#[derive(Clone, Default)]
pub struct ClientOptions {
    /// Service account key, raw JSON or base64-encoded JSON
    credentials: Option<String>,
    /// Explicit project id, wins over every other source
    project_id: Option<String>,
}

impl ClientOptions {
    pub fn new(credentials: Option<String>, project_id: Option<String>) -> Self {
        Self {
            credentials: non_empty(credentials),
            project_id: non_empty(project_id),
        }
    }

    /// Credentials, if any were supplied
    pub fn credentials(&self) -> Option<&str> {
        trimmed(self.credentials.as_deref())
    }

    /// Explicit project id, if any was supplied
    pub fn project_id(&self) -> Option<&str> {
        trimmed(self.project_id.as_deref())
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Security: never print key material
        f.debug_struct("ClientOptions")
            .field("credentials", &self.credentials.as_ref().map(|_| "<redacted>"))
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// The parts of the process environment credential resolution reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// `GCLOUD_PROJECT`
    pub default_project: Option<String>,
    /// `GOOGLE_APPLICATION_CREDENTIALS`
    pub credentials_path: Option<String>,
}

impl Environment {
    /// Snapshot the current process environment
    pub fn from_process() -> Self {
        Self {
            default_project: non_empty(std::env::var(DEFAULT_PROJECT_VAR).ok()),
            credentials_path: non_empty(std::env::var(CREDENTIALS_PATH_VAR).ok()),
        }
    }

    /// Both variables are present, so gcloud-exported credentials can be used
    pub fn has_default_credentials(&self) -> bool {
        self.default_project().is_some() && self.credentials_path().is_some()
    }

    pub fn default_project(&self) -> Option<&str> {
        trimmed(self.default_project.as_deref())
    }

    pub fn credentials_path(&self) -> Option<&str> {
        trimmed(self.credentials_path.as_deref())
    }
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Action hosts pass `""` for unset inputs; treat those as absent
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
