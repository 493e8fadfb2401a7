use crate::{
    authority::{FileAuthority, StorePaths},
    cli::commands::storage::{ARG_DATA_DIR, ARG_LOG_DIR},
    clock::SystemClock,
    session::{Session, SessionRegistry},
    store::JsonFileStore,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub const LOG_FILE: &str = "examgate.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalArgs {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(data_dir: PathBuf, log_dir: Option<PathBuf>) -> Self {
        let log_dir = log_dir.unwrap_or_else(|| data_dir.join("logs"));
        Self { data_dir, log_dir }
    }

    /// Read the global options, falling back to the platform data directory.
    ///
    /// # Errors
    /// Returns an error if no data directory is given and the platform has none.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let data_dir = match matches.get_one::<PathBuf>(ARG_DATA_DIR) {
            Some(dir) => dir.clone(),
            None => ProjectDirs::from("dev", "examgate", "examgate")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .context("no home directory; set --data-dir or EXAMGATE_DATA_DIR")?,
        };
        Ok(Self::new(
            data_dir,
            matches.get_one::<PathBuf>(ARG_LOG_DIR).cloned(),
        ))
    }

    #[must_use]
    pub fn store_paths(&self) -> StorePaths {
        StorePaths::new(&self.data_dir)
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE)
    }

    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn authority(&self) -> Result<FileAuthority> {
        FileAuthority::open(&self.data_dir, SystemClock)
            .with_context(|| format!("failed to open stores in {}", self.data_dir.display()))
    }

    /// A second handle on the session store, for the heartbeat task.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn session_registry(&self) -> Result<SessionRegistry<JsonFileStore<Session>>> {
        let store = JsonFileStore::open(self.store_paths().sessions)
            .with_context(|| format!("failed to open stores in {}", self.data_dir.display()))?;
        Ok(SessionRegistry::new(store, SystemClock))
    }
}
