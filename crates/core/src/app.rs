//! Top-level operations: sync, list, connect and wipe.

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};

use crate::classifier::{ErrorClassifier, ErrorKind};
use crate::config::Config;
use crate::credentials::{CredentialProvider, Credentials, KeyringStore, PasswordPrompt};
use crate::dependencies::ensure_dependencies;
use crate::desktop::{DesktopNotifier, Launcher, Notifier, SystemLauncher};
use crate::error::{Error, Result};
use crate::listing::{apply_blacklist, compile_blacklist, sort_by_recency, write_table};
use crate::model::DataSource;
use crate::recovery::{RecoveryController, TITLE_RESOURCE_NOT_FOUND};
use crate::sdm::{ExternalTool, SdmClient};
use crate::storage::Storage;

pub const TITLE_CONNECTED: &str = "🔌 Data Source Connected";

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}

pub struct App {
    config: Config,
    storage: Storage,
    tool: Box<dyn ExternalTool>,
    credentials: Box<dyn CredentialProvider>,
    notifier: Box<dyn Notifier>,
    launcher: Box<dyn Launcher>,
}

impl App {
    pub fn new(
        config: Config,
        storage: Storage,
        tool: Box<dyn ExternalTool>,
        credentials: Box<dyn CredentialProvider>,
        notifier: Box<dyn Notifier>,
        launcher: Box<dyn Launcher>,
    ) -> Self {
        Self {
            config,
            storage,
            tool,
            credentials,
            notifier,
            launcher,
        }
    }

    /// Wires the real `sdm` client, keyring, desktop notifier and launcher.
    ///
    /// # Errors
    ///
    /// Returns an error if a required program is missing or the cache
    /// cannot be opened.
    pub fn from_config(config: Config, prompt: Box<dyn PasswordPrompt>) -> Result<Self> {
        if config.account.is_empty() {
            return Err(Error::MissingAccount);
        }

        ensure_dependencies(&config)?;

        let storage = Storage::open(&config.account, &config.db_directory)?;
        let tool = SdmClient::new(
            &config.sdm_executable,
            config.timeout,
            ErrorClassifier::with_extra_patterns(&config.error_patterns),
        );
        let credentials = Credentials::new(Box::new(KeyringStore), prompt);

        Ok(Self::new(
            config,
            storage,
            Box::new(tool),
            Box::new(credentials),
            Box::new(DesktopNotifier),
            Box::new(SystemLauncher),
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    fn controller(&self) -> RecoveryController<'_> {
        RecoveryController::new(
            &self.config.account,
            self.tool.as_ref(),
            self.credentials.as_ref(),
            self.notifier.as_ref(),
        )
    }

    /// Makes sure `sdm` is not logged in as a different account.
    ///
    /// An unauthenticated session is fine here: the next operation logs in.
    ///
    /// # Errors
    ///
    /// Returns an error if `sdm ready` or `sdm logout` fail for any other
    /// reason.
    pub fn validate_account(&self) -> Result<()> {
        let state = match self.tool.ready() {
            Ok(state) => state,
            Err(e) if e.kind() == Some(ErrorKind::Unauthorized) => {
                debug!("Not logged in");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let Some(current) = state.account else {
            return Ok(());
        };

        if current == self.config.account {
            return Ok(());
        }

        info!(
            "Logged in as `{current}` instead of `{}`, logging out",
            self.config.account
        );

        match self.tool.logout() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == Some(ErrorKind::Unauthorized) => {
                debug!("Already logged out");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Refreshes the cache from `sdm status`, returning how many records
    /// were stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be fetched or stored.
    pub fn sync(&mut self) -> Result<usize> {
        info!("Syncing data sources");
        self.validate_account()?;

        let data_sources = self.controller().run_with_recovery(|| self.tool.status())?;
        let stored = self.storage.store_data_sources(&data_sources)?;

        info!("Synced {stored} data sources");
        Ok(stored)
    }

    /// Cached data sources without blacklisted names, most recently used
    /// first. An empty cache is synced first.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache is empty and syncing fails.
    pub fn data_sources(&mut self) -> Result<Vec<DataSource>> {
        let mut data_sources = self.storage.retrieve_data_sources();

        if data_sources.is_empty() {
            info!("No data sources cached, syncing");
            self.sync()?;
            data_sources = self.storage.retrieve_data_sources();
        }

        let blacklist = compile_blacklist(&self.config.blacklist_patterns);
        let mut data_sources = apply_blacklist(data_sources, &blacklist);
        sort_by_recency(&mut data_sources);

        debug!("{} data sources after filtering", data_sources.len());
        Ok(data_sources)
    }

    /// Writes the listing to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data sources cannot be loaded or written.
    pub fn list<W: Write>(&mut self, writer: &mut W, with_headers: bool) -> Result<()> {
        let data_sources = self.data_sources()?;
        write_table(writer, &data_sources, with_headers)
    }

    /// Connects to the cached data source `name`.
    ///
    /// On success the address is opened in a browser or copied to the
    /// clipboard, and the cache is re-synced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] without calling `sdm` if `name` is not
    /// cached, or the controller's error if connecting fails.
    pub fn connect(&mut self, name: &str) -> Result<DataSource> {
        let Some(data_source) = self.storage.get_data_source(name) else {
            warn!("Data source `{name}` not found in cache");
            self.notifier.notify(TITLE_RESOURCE_NOT_FOUND, name);
            return Err(Error::NotFound(name.to_string()));
        };

        self.validate_account()?;

        if let Err(e) = self.storage.touch(name, now()) {
            warn!("Failed to update last use of `{name}`: {e}");
        }

        self.controller()
            .run_with_recovery(|| self.tool.connect(&data_source.name))?;

        info!("Connected to `{}`", data_source.name);
        self.hand_off(&data_source);

        if let Err(e) = self.sync() {
            warn!("Failed to sync after connecting: {e}");
        }

        Ok(data_source)
    }

    fn hand_off(&self, data_source: &DataSource) {
        let result = if data_source.opens_in_browser() {
            self.launcher.open_url(&data_source.address)
        } else {
            self.launcher.copy_to_clipboard(&data_source.address)
        };

        if let Err(e) = result {
            warn!("Failed to hand off `{}`: {e}", data_source.address);
        }

        self.notifier.notify(
            TITLE_CONNECTED,
            &format!("{}\n📋 <b>{}</b>", data_source.name, data_source.address),
        );
    }

    /// Drops every cached record of the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn wipe(&mut self) -> Result<usize> {
        info!("Wiping cache for `{}`", self.config.account);
        self.storage.wipe()
    }
}
