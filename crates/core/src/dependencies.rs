//! External programs a configuration needs at runtime.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use log::{debug, error};

use crate::config::{Config, PromptKind};
use crate::error::{Error, Result};

const ZENITY: &str = "zenity";

/// Programs the configuration will launch, in the order they are used.
pub fn required_binaries(config: &Config) -> IndexSet<String> {
    let mut binaries = IndexSet::new();
    binaries.insert(config.sdm_executable.clone());

    if config.password_prompt == PromptKind::Zenity {
        binaries.insert(ZENITY.to_string());
    }

    if let Some(menu) = config.menu {
        binaries.insert(menu.binary().to_string());
    }

    binaries
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

/// Resolves `binary` against the directories in `path_var`.
///
/// A name containing a path separator is checked as given.
pub fn find_in_path(binary: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    let candidate = Path::new(binary);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    env::split_paths(path_var?)
        .map(|directory| directory.join(binary))
        .find(|path| is_executable(path))
}

/// The entries of `binaries` that cannot be found in `path_var`.
pub fn missing_binaries<'a, I>(binaries: I, path_var: Option<&OsStr>) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    binaries
        .into_iter()
        .filter(|binary| match find_in_path(binary, path_var) {
            Some(path) => {
                debug!("Found `{binary}` at `{}`", path.display());
                false
            }
            None => {
                error!("`{binary}` not found in PATH");
                true
            }
        })
        .cloned()
        .collect()
}

/// Fails unless every program the configuration needs is installed.
///
/// # Errors
///
/// Returns [`Error::MissingDependencies`] listing every missing program.
pub fn ensure_dependencies(config: &Config) -> Result<()> {
    let path_var = env::var_os("PATH");
    let missing = missing_binaries(&required_binaries(config), path_var.as_deref());

    if missing.is_empty() {
        debug!("All dependencies available");
        Ok(())
    } else {
        Err(Error::MissingDependencies(missing))
    }
}
