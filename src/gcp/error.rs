//! Error taxonomy for credential resolution and Cloud Run lookups

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced while resolving credentials or fetching a service
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A required input was empty or missing
    #[error("Missing \"{0}\" input")]
    MissingInput(&'static str),

    /// Neither credentials nor an environment-only setup were found
    #[error(
        "No method for authentication. Set credentials in this action or export credentials from the setup-gcloud action"
    )]
    AuthenticationUnavailable,

    /// The supplied credentials are not valid (base64-encoded) JSON
    #[error("Unable to parse credentials")]
    CredentialParse(#[source] BoxError),

    /// No project id could be resolved from any source
    #[error("No project Id found. Set \"project_id\" input.")]
    ProjectIdNotFound,

    /// The identity provider could not produce a session
    #[error("Unable to retrieve authenticated client")]
    AuthenticationFailed(#[source] BoxError),

    /// The Cloud Run API returned an error, or the request never completed
    #[error("{}", describe_remote(.status, .code, .message))]
    RemoteLookup {
        /// HTTP status, `None` when the transport failed
        status: Option<u16>,
        /// Google API status string, e.g. `NOT_FOUND`
        code: Option<String>,
        message: String,
    },
}

fn describe_remote(status: &Option<u16>, code: &Option<String>, message: &str) -> String {
    match (status, code) {
        (Some(status), Some(code)) => format!("Service lookup failed ({status} {code}): {message}"),
        (Some(status), None) => format!("Service lookup failed ({status}): {message}"),
        (None, _) => format!("Service lookup failed: {message}"),
    }
}

impl Error {
    pub(crate) fn credential_parse<T>(source: T) -> Self
    where
        T: Into<BoxError>,
    {
        Self::CredentialParse(source.into())
    }

    pub(crate) fn authentication_failed<T>(source: T) -> Self
    where
        T: Into<BoxError>,
    {
        Self::AuthenticationFailed(source.into())
    }

    pub(crate) fn transport(error: &reqwest::Error) -> Self {
        Self::RemoteLookup {
            status: error.status().map(|s| s.as_u16()),
            code: None,
            message: error.to_string(),
        }
    }

    /// Inputs or credentials are wrong; retrying will not help
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingInput(_)
                | Self::AuthenticationUnavailable
                | Self::CredentialParse(_)
                | Self::ProjectIdNotFound
        )
    }

    /// The service (or namespace) does not exist
    pub fn is_not_found(&self) -> bool {
        self.remote_matches(404, "NOT_FOUND")
    }

    /// The caller lacks permission to read the service
    pub fn is_permission_denied(&self) -> bool {
        self.remote_matches(403, "PERMISSION_DENIED")
    }

    /// Re-running the whole step might succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::AuthenticationFailed(_) => true,
            Self::RemoteLookup { status: None, .. } => true,
            Self::RemoteLookup {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// HTTP status of a failed lookup
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteLookup { status, .. } => *status,
            _ => None,
        }
    }

    fn remote_matches(&self, http: u16, google: &str) -> bool {
        match self {
            Self::RemoteLookup { status, code, .. } => {
                *status == Some(http) || code.as_deref() == Some(google)
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
