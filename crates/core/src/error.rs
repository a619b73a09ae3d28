use thiserror::Error;

use crate::classifier::{ErrorKind, SdmError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A failure of the wrapped tool, classified from its output.
    #[error("{}", _0)]
    Sdm(#[from] SdmError),

    #[error("Resource not found: {}", _0)]
    ResourceNotFound(SdmError),

    #[error("Credentials for `{}` were rejected and removed from the keyring: {}", .account, .source)]
    CredentialsRevoked { account: String, source: Box<Error> },

    #[error("Command failed: {}", _0)]
    CommandFailed(SdmError),

    #[error("Data source `{}` is not in the cache. Try `sdm-ui sync`.", _0)]
    NotFound(String),

    #[error("Error launching `{}`: {}", .program, .original)]
    Launch {
        program: String,
        original: std::io::Error,
    },

    #[error("`{}` did not finish within {} seconds", .program, .seconds)]
    Timeout { program: String, seconds: u64 },

    #[error("Error parsing output of `{}`: {}", .operation, .original)]
    Json {
        operation: String,
        original: serde_json::Error,
    },

    #[error("Error {} {} file at `{}`: {}", .action, .file_description, .path, .original)]
    Yaml {
        action: String,
        file_description: String,
        path: String,
        original: serde_yaml::Error,
    },

    #[error("IO error with {} file at path `{}`: {}", .file_description, .path, .original)]
    Io {
        file_description: String,
        path: String,
        original: std::io::Error,
    },

    #[error("Invalid pattern: {}", .0)]
    Regex(#[from] regex::Error),

    #[error("Error encoding cache data: {}", .0)]
    Encoding(#[from] postcard::Error),

    #[error("The cache at `{}` is locked by another sdm-ui process", .0)]
    CacheLocked(String),

    #[error("Keyring error: {}", .0)]
    Keyring(#[from] keyring::Error),

    #[error("Clipboard error: {}", .0)]
    Clipboard(String),

    #[error("Password prompt failed: {}", .0)]
    Prompt(String),

    #[error("Empty password provided")]
    EmptyPassword,

    #[error("Cancelled by user")]
    Cancelled,

    #[error("No account configured. Pass `--email` or set `email` in the config file.")]
    MissingAccount,

    #[error("Required programs not found in PATH: {}", .0.join(", "))]
    MissingDependencies(Vec<String>),

    #[error("STDIO error: {}", .0)]
    Stdio(#[from] std::io::Error),

    #[error("Misc error: {}", .0)]
    Misc(String),
}

impl Error {
    pub fn launch_error(program: &str, original: std::io::Error) -> Self {
        Self::Launch {
            program: program.to_string(),
            original,
        }
    }

    pub fn json_error(operation: &str, original: serde_json::Error) -> Self {
        Self::Json {
            operation: operation.to_string(),
            original,
        }
    }

    pub fn yaml_error(
        action: String,
        file_description: String,
        path: String,
        original: serde_yaml::Error,
    ) -> Self {
        Self::Yaml {
            action,
            file_description,
            path,
            original,
        }
    }

    pub fn io_error(file_description: String, path: String, original: std::io::Error) -> Self {
        Self::Io {
            file_description,
            path,
            original,
        }
    }

    /// The classified kind carried by this error, if the wrapped tool produced it.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Sdm(e) | Self::ResourceNotFound(e) | Self::CommandFailed(e) => Some(e.kind),
            Self::CredentialsRevoked { source, .. } => source.kind(),
            _ => None,
        }
    }

    /// Process exit code for this error.
    ///
    /// Lookups that found nothing exit with 2 and rejected credentials with 3,
    /// so scripts can tell them apart from generic failures (1).
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ResourceNotFound(_) | Self::NotFound(_) => 2,
            Self::CredentialsRevoked { .. } => 3,
            _ => 1,
        }
    }
}
