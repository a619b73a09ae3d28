//! Client for the strongDM `sdm` executable.

use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Deserializer};

use crate::classifier::ErrorClassifier;
use crate::error::{Error, Result};
use crate::execution::{run_command, CommandOutput};
use crate::model::DataSource;

/// Operations of the wrapped tool that sdm-ui relies on.
pub trait ExternalTool {
    /// `sdm ready`: which account is logged in and whether the listener runs.
    fn ready(&self) -> Result<ReadyState>;

    /// `sdm login --email <account>`, with the password on stdin.
    fn login(&self, account: &str, password: &str) -> Result<()>;

    /// `sdm logout`.
    fn logout(&self) -> Result<()>;

    /// `sdm status -j`, parsed into records with `last_used_at` unset.
    fn status(&self) -> Result<Vec<DataSource>>;

    /// `sdm connect <name>`.
    fn connect(&self, name: &str) -> Result<()>;
}

/// Reads `null` as the zero value, the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Output of `sdm ready`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadyState {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub listener_running: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state_loaded: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_linked: bool,
}

/// One element of the `sdm status -j` array.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
struct Resource {
    #[serde(deserialize_with = "null_as_default")]
    name: String,
    #[serde(deserialize_with = "null_as_default")]
    connection_status: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    kind: String,
    #[serde(deserialize_with = "null_as_default")]
    tags: String,
    address: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    message: String,
    web_url: Option<String>,
}

impl From<Resource> for DataSource {
    fn from(resource: Resource) -> Self {
        let address = match resource.address {
            Some(address) if !address.is_empty() => address,
            _ => {
                debug!("Using message as address for `{}`", resource.name);
                resource.message
            }
        };

        DataSource {
            name: resource.name,
            status: resource.connection_status,
            address,
            kind: resource.kind,
            tags: resource.tags,
            web_url: resource.web_url.filter(|url| !url.is_empty()),
            last_used_at: 0,
        }
    }
}

/// Parses the JSON array printed by `sdm status -j`.
///
/// Blank output means the account has no resources. Entries without a name
/// cannot be cached and are dropped.
///
/// # Errors
///
/// Returns an error if the output is not a JSON array of resources.
pub fn parse_status(raw: &str) -> Result<Vec<DataSource>> {
    if raw.trim().is_empty() {
        warn!("`sdm status` returned no output");
        return Ok(Vec::new());
    }

    let resources: Vec<Resource> =
        serde_json::from_str(raw).map_err(|e| Error::json_error("sdm status -j", e))?;

    debug!("Parsed {} resources", resources.len());

    Ok(resources
        .into_iter()
        .filter(|resource| {
            if resource.name.is_empty() {
                warn!("Skipping resource without a name");
            }
            !resource.name.is_empty()
        })
        .map(DataSource::from)
        .collect())
}

/// Runs the real `sdm` binary.
#[derive(Debug, Clone)]
pub struct SdmClient {
    executable: String,
    timeout: Duration,
    classifier: ErrorClassifier,
}

impl SdmClient {
    pub fn new(executable: &str, timeout: Duration, classifier: ErrorClassifier) -> Self {
        Self {
            executable: executable.to_string(),
            timeout,
            classifier,
        }
    }

    fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput> {
        let output = run_command(&self.executable, args, stdin, Some(self.timeout))?;
        self.classifier.check(&output)?;
        Ok(output)
    }
}

impl ExternalTool for SdmClient {
    fn ready(&self) -> Result<ReadyState> {
        let output = self.run(&["ready"], None)?;
        debug!("Ready output: {}", output.stdout.trim());

        serde_json::from_str(&output.stdout).map_err(|e| Error::json_error("sdm ready", e))
    }

    fn login(&self, account: &str, password: &str) -> Result<()> {
        let stdin = format!("{password}\n");
        self.run(&["login", "--email", account], Some(&stdin))?;
        debug!("Logged in as `{account}`");
        Ok(())
    }

    fn logout(&self) -> Result<()> {
        self.run(&["logout"], None)?;
        debug!("Logged out");
        Ok(())
    }

    fn status(&self) -> Result<Vec<DataSource>> {
        let output = self.run(&["status", "-j"], None)?;
        parse_status(&output.stdout)
    }

    fn connect(&self, name: &str) -> Result<()> {
        self.run(&["connect", name], None)?;
        debug!("Connected to `{name}`");
        Ok(())
    }
}
