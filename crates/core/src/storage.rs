//! On-disk cache of data sources.
//!
//! All accounts share one file, `sdm-sources.db`, holding a map from
//! namespace to records. A namespace is `<account>:datasource:v<N>`; only
//! the namespace for [`CURRENT_SCHEMA_VERSION`] is read or written. Older
//! namespaces are cleaned up when the cache is opened.
//!
//! The handle holds an exclusive lock on `sdm-sources.db.lock` until it is
//! dropped, so a second sdm-ui process waits for the first to finish.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::model::DataSource;

pub const CACHE_FILE_NAME: &str = "sdm-sources.db";
pub const CURRENT_SCHEMA_VERSION: u32 = 2;
/// How many schema versions behind the current one are kept.
pub const RETENTION_VERSIONS: u32 = 2;
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const NAMESPACE_KIND: &str = "datasource";
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
struct CacheFile {
    namespaces: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
}

#[derive(Debug, PartialEq, Eq)]
enum Namespace<'a> {
    Legacy { account: &'a str },
    Versioned { account: &'a str, version: u32 },
}

fn namespace_key(account: &str, version: u32) -> String {
    format!("{account}:{NAMESPACE_KIND}:v{version}")
}

/// The account part of `account:datasource`, if any.
fn strip_kind(prefix: &str) -> Option<&str> {
    prefix
        .strip_suffix(NAMESPACE_KIND)
        .and_then(|rest| rest.strip_suffix(':'))
        .filter(|account| !account.is_empty())
}

/// Reads `account:datasource` and `account:datasource:vN` from the right,
/// so accounts may themselves contain `:`.
fn parse_namespace_key(key: &str) -> Option<Namespace<'_>> {
    if let Some(account) = strip_kind(key) {
        return Some(Namespace::Legacy { account });
    }

    let (prefix, version) = key.rsplit_once(':')?;
    let account = strip_kind(prefix)?;

    let Some(version) = version
        .strip_prefix('v')
        .and_then(|v| v.parse::<u32>().ok())
    else {
        warn!("Invalid version format in cache namespace `{key}`");
        return None;
    };

    Some(Namespace::Versioned { account, version })
}

fn lock_cache(lock_path: &Path, timeout: Duration) -> Result<File> {
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)
        .map_err(|e| {
            Error::io_error(
                "cache lock".to_string(),
                lock_path.display().to_string(),
                e,
            )
        })?;

    let deadline = Instant::now() + timeout;
    loop {
        match lock_file.try_lock_exclusive() {
            Ok(()) => return Ok(lock_file),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                if Instant::now() >= deadline {
                    return Err(Error::CacheLocked(lock_path.display().to_string()));
                }
                thread::sleep(LOCK_POLL_INTERVAL);
            }
            Err(e) => {
                return Err(Error::io_error(
                    "cache lock".to_string(),
                    lock_path.display().to_string(),
                    e,
                ))
            }
        }
    }
}

fn read_cache_file(path: &Path) -> Result<CacheFile> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(CacheFile::default()),
        Err(e) => {
            return Err(Error::io_error(
                "cache".to_string(),
                path.display().to_string(),
                e,
            ))
        }
    };

    if bytes.is_empty() {
        return Ok(CacheFile::default());
    }

    match postcard::from_bytes(&bytes) {
        Ok(cache) => Ok(cache),
        Err(e) => {
            warn!(
                "Cache at `{}` is unreadable, starting from an empty cache: {e}",
                path.display()
            );
            Ok(CacheFile::default())
        }
    }
}

/// Account-scoped view of the cache file.
#[derive(Debug)]
pub struct Storage {
    account: String,
    path: PathBuf,
    data: CacheFile,
    _lock: File,
}

impl Storage {
    /// Opens the cache in `directory` for `account`, creating the directory
    /// if needed and removing outdated namespaces.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `account` is empty
    /// - The directory cannot be created
    /// - Another process holds the cache lock for longer than 5 seconds
    /// - The cache file exists but cannot be read
    pub fn open(account: &str, directory: &Path) -> Result<Self> {
        Self::open_with_timeout(account, directory, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn open_with_timeout(
        account: &str,
        directory: &Path,
        lock_timeout: Duration,
    ) -> Result<Self> {
        if account.is_empty() {
            return Err(Error::MissingAccount);
        }

        std::fs::create_dir_all(directory).map_err(|e| {
            Error::io_error(
                "database directory".to_string(),
                directory.display().to_string(),
                e,
            )
        })?;

        let path = directory.join(CACHE_FILE_NAME);
        debug!("Opening cache at `{}`", path.display());

        let lock = lock_cache(&path.with_extension("db.lock"), lock_timeout)?;
        let data = read_cache_file(&path)?;

        let mut storage = Self {
            account: account.to_string(),
            path,
            data,
            _lock: lock,
        };

        match storage.remove_old_namespaces() {
            Ok(0) => {}
            Ok(removed) => debug!("Removed {removed} outdated cache namespaces"),
            Err(e) => warn!("Failed to remove outdated cache namespaces: {e}"),
        }

        Ok(storage)
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every namespace key in the file, across all accounts.
    pub fn namespaces(&self) -> Vec<String> {
        self.data.namespaces.keys().cloned().collect()
    }

    fn current_namespace(&self) -> String {
        namespace_key(&self.account, CURRENT_SCHEMA_VERSION)
    }

    fn records(&self) -> Option<&BTreeMap<String, Vec<u8>>> {
        self.data.namespaces.get(&self.current_namespace())
    }

    fn persist(&self) -> Result<()> {
        let io_error = |e: std::io::Error| {
            Error::io_error("cache".to_string(), self.path.display().to_string(), e)
        };

        let bytes = postcard::to_stdvec(&self.data)?;
        let directory = self.path.parent().unwrap_or_else(|| Path::new("."));

        let mut temp_file = NamedTempFile::new_in(directory).map_err(io_error)?;
        temp_file.write_all(&bytes).map_err(io_error)?;
        temp_file.as_file().sync_all().map_err(io_error)?;
        temp_file.persist(&self.path).map_err(|e| io_error(e.error))?;

        Ok(())
    }

    /// Drops legacy unversioned namespaces and this account's namespaces that
    /// are more than [`RETENTION_VERSIONS`] behind the current schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written back.
    pub fn remove_old_namespaces(&mut self) -> Result<usize> {
        let outdated: Vec<String> = self
            .data
            .namespaces
            .keys()
            .filter(|key| match parse_namespace_key(key) {
                Some(Namespace::Legacy { .. }) => true,
                Some(Namespace::Versioned { account, version }) => {
                    account == self.account
                        && CURRENT_SCHEMA_VERSION.saturating_sub(version) > RETENTION_VERSIONS
                }
                None => false,
            })
            .cloned()
            .collect();

        if outdated.is_empty() {
            return Ok(0);
        }

        for key in &outdated {
            debug!("Removing cache namespace `{key}`");
            self.data.namespaces.remove(key);
        }
        self.persist()?;

        Ok(outdated.len())
    }

    /// Writes `data_sources` into the account's namespace.
    ///
    /// Records already in the cache keep their `last_used_at`; every other
    /// field is replaced. Records that are not in `data_sources` stay as they
    /// are.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn store_data_sources(&mut self, data_sources: &[DataSource]) -> Result<usize> {
        if data_sources.is_empty() {
            debug!("No data sources to store");
            return Ok(0);
        }

        let namespace = self.current_namespace();
        let records = self.data.namespaces.entry(namespace).or_default();

        let mut stored = 0;
        for data_source in data_sources {
            if data_source.name.is_empty() {
                warn!("Skipping data source without a name");
                continue;
            }

            let mut data_source = data_source.clone();
            if let Some(existing) = records.get(data_source.key()) {
                match DataSource::decode(existing) {
                    Ok(existing) => data_source.last_used_at = existing.last_used_at,
                    Err(e) => warn!("Failed to decode cached `{}`: {e}", data_source.name),
                }
            }

            match data_source.encode() {
                Ok(blob) => {
                    records.insert(data_source.name.clone(), blob);
                    stored += 1;
                }
                Err(e) => warn!("Failed to encode `{}`: {e}", data_source.name),
            }
        }

        debug!("Stored {stored} of {} data sources", data_sources.len());
        self.persist()?;

        Ok(stored)
    }

    /// All cached records of the account, ordered by name.
    ///
    /// Records that fail to decode are logged and skipped.
    pub fn retrieve_data_sources(&self) -> Vec<DataSource> {
        let Some(records) = self.records() else {
            return Vec::new();
        };

        records
            .iter()
            .filter_map(|(name, blob)| match DataSource::decode(blob) {
                Ok(data_source) => Some(data_source),
                Err(e) => {
                    warn!("Failed to decode cached `{name}`: {e}");
                    None
                }
            })
            .collect()
    }

    pub fn get_data_source(&self, name: &str) -> Option<DataSource> {
        if name.is_empty() {
            return None;
        }

        let blob = self.records()?.get(name)?;
        match DataSource::decode(blob) {
            Ok(data_source) => Some(data_source),
            Err(e) => {
                warn!("Failed to decode cached `{name}`: {e}");
                None
            }
        }
    }

    /// Records a use of `name` at `timestamp`.
    ///
    /// The stored value never goes backwards. Returns the updated record, or
    /// `None` if the name is not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn touch(&mut self, name: &str, timestamp: i64) -> Result<Option<DataSource>> {
        let Some(mut data_source) = self.get_data_source(name) else {
            return Ok(None);
        };

        data_source.last_used_at = data_source.last_used_at.max(timestamp);
        debug!("Marking `{name}` as used at {}", data_source.last_used_at);

        let blob = data_source.encode()?;
        let namespace = self.current_namespace();
        self.data
            .namespaces
            .entry(namespace)
            .or_default()
            .insert(name.to_string(), blob);
        self.persist()?;

        Ok(Some(data_source))
    }

    /// Removes every namespace that belongs to the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn wipe(&mut self) -> Result<usize> {
        let before = self.data.namespaces.len();
        let account = self.account.clone();

        self.data.namespaces.retain(|key, _| {
            let owned = match parse_namespace_key(key) {
                Some(Namespace::Legacy { account: owner })
                | Some(Namespace::Versioned { account: owner, .. }) => owner == account,
                None => false,
            };
            if owned {
                debug!("Removing cache namespace `{key}`");
            }
            !owned
        });

        let removed = before - self.data.namespaces.len();
        self.persist()?;
        debug!("Wiped {removed} cache namespaces for `{account}`");

        Ok(removed)
    }
}
