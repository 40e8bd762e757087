//! Action host glue
//!
//! Validates the step inputs, wires up a [`CloudRunClient`], and reports the
//! result the way GitHub Actions expects (`$GITHUB_OUTPUT` and workflow
//! commands).

use crate::config::{ClientOptions, Environment};
use crate::gcp::auth;
use crate::gcp::client::CloudRunClient;
use crate::gcp::error::{Error, Result};
use anyhow::Context;
use std::io::Write;
use std::path::Path;

/// Name of the output the image is published under
pub const IMAGE_OUTPUT: &str = "image";

/// File the runner collects step outputs from
pub const GITHUB_OUTPUT_VAR: &str = "GITHUB_OUTPUT";

/// Inputs of one lookup
#[derive(Debug, Clone, Default)]
pub struct ActionInputs {
    pub region: String,
    pub name: String,
    pub project_id: Option<String>,
    pub credentials: Option<String>,
    /// API root override, mostly for emulators and tests
    pub endpoint: Option<String>,
}

impl ActionInputs {
    /// Check the required inputs are present
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::MissingInput("name"));
        }
        if self.region.trim().is_empty() {
            return Err(Error::MissingInput("region"));
        }
        Ok(())
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::new(self.credentials.clone(), self.project_id.clone())
    }
}

/// Validate inputs, resolve the identity, and build a client
pub fn build_client(inputs: &ActionInputs, env: &Environment) -> Result<CloudRunClient> {
    inputs.validate()?;

    let mut identity = auth::resolve(&inputs.region, &inputs.client_options(), env)?;
    if let Some(endpoint) = inputs.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
        tracing::info!("Using API endpoint override {}", endpoint);
        identity = identity.with_endpoint(endpoint.trim());
    }
    tracing::debug!("Resolved {:?}", identity);

    CloudRunClient::from_identity(identity)
}

/// Look up the image of the requested service
pub async fn run(inputs: &ActionInputs, env: &Environment) -> anyhow::Result<Option<String>> {
    let client = build_client(inputs, env).context("Failed to configure Cloud Run client")?;
    lookup(&client, inputs.name.trim()).await
}

/// Look up the image of `service_name` with an existing client
pub async fn lookup(client: &CloudRunClient, service_name: &str) -> anyhow::Result<Option<String>> {
    client
        .get_service_image(service_name)
        .await
        .with_context(|| format!("Failed to read service {}", service_name))
}

/// Publish a step output, to `$GITHUB_OUTPUT` when set, stdout otherwise
pub fn set_output(name: &str, value: &str) -> anyhow::Result<()> {
    match std::env::var_os(GITHUB_OUTPUT_VAR).filter(|p| !p.is_empty()) {
        Some(path) => write_output(Path::new(&path), name, value),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(format_output(name, value).as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

/// Append an output entry to an output file
pub fn write_output(path: &Path, name: &str, value: &str) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open output file {}", path.display()))?;

    file.write_all(format_output(name, value).as_bytes())
        .with_context(|| format!("Failed to write output file {}", path.display()))
}

/// `name=value`, or the heredoc form for values spanning lines
pub fn format_output(name: &str, value: &str) -> String {
    if !value.contains('\n') && !value.contains('\r') {
        return format!("{}={}\n", name, value);
    }

    let mut delimiter = String::from("ghadelimiter");
    while value.contains(&delimiter) {
        delimiter.push('_');
    }
    format!("{name}<<{delimiter}\n{value}\n{delimiter}\n")
}

/// Workflow command that marks the step as failed with `error`'s chain
pub fn error_command(error: &anyhow::Error) -> String {
    format!("::error::{}", escape_data(&format!("{:#}", error)))
}

/// Escape a workflow command message
fn escape_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(region: &str, name: &str) -> ActionInputs {
        ActionInputs {
            region: region.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_checks_name_then_region() {
        assert!(matches!(inputs("", "").validate(), Err(Error::MissingInput("name"))));
        assert!(matches!(inputs(" ", "hello").validate(), Err(Error::MissingInput("region"))));
        assert!(inputs("us-central1", "hello").validate().is_ok());
    }

    #[test]
    fn test_build_client_applies_endpoint_override() {
        let mut inputs = inputs("us-central1", "hello");
        inputs.project_id = Some("demo-project".to_string());
        inputs.endpoint = Some("http://localhost:9090/".to_string());
        let env = Environment {
            default_project: Some("env-project".to_string()),
            credentials_path: Some("/key.json".to_string()),
        };

        let client = build_client(&inputs, &env).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9090");
        assert_eq!(client.parent(), "namespaces/demo-project");
    }

    #[test]
    fn test_format_output() {
        assert_eq!(format_output("image", "nginx:latest"), "image=nginx:latest\n");
        assert_eq!(format_output("image", ""), "image=\n");
        assert_eq!(
            format_output("image", "a\nb"),
            "image<<ghadelimiter\na\nb\nghadelimiter\n"
        );
        assert_eq!(
            format_output("image", "ghadelimiter\nx"),
            "image<<ghadelimiter_\nghadelimiter\nx\nghadelimiter_\n"
        );
    }

    #[test]
    fn test_write_output_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output");
        std::fs::write(&path, "previous=1\n").unwrap();

        write_output(&path, IMAGE_OUTPUT, "gcr.io/proj/img:tag").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "previous=1\nimage=gcr.io/proj/img:tag\n");
    }

    #[test]
    fn test_error_command_prints_each_cause_once() {
        let cause = anyhow::anyhow!("invalid_grant").context("Failed to load service account key");
        let error = anyhow::Error::from(Error::authentication_failed(cause))
            .context("Failed to read service hello");

        let command = error_command(&error);
        assert_eq!(
            command,
            "::error::Failed to read service hello: Unable to retrieve authenticated client: \
             Failed to load service account key: invalid_grant"
        );
        assert_eq!(command.matches("Failed to load service account key").count(), 1);
    }

    #[test]
    fn test_error_command_escapes_message() {
        let error = anyhow::anyhow!("100% broken\nsecond line").context("Failed to read service hello");
        assert_eq!(
            error_command(&error),
            "::error::Failed to read service hello: 100%25 broken%0Asecond line"
        );
    }
}
