//! Over-the-air updates for the files deployed on the sensor.
//!
//! Each tracked file is compared with its counterpart in a GitHub repository
//! using git blob shas. Newer files are downloaded next to the installed one,
//! validated, and only then moved into place.

use std::{fs, path::Path};

use log::{info, warn};

use crate::{config::OtaConfig, error::OtaError, watchdog::Watchdog};

pub mod database;
pub mod entry;
pub mod github;
pub mod validate;

use database::VersionDatabase;
use entry::{OtaEntry, ERROR_FILE_PREFIX, LATEST_FILE_PREFIX};
use github::{decode_content, Contents, GitHubClient};

pub struct OtaUpdater {
    github: GitHubClient,
    entries: Vec<OtaEntry>,
    db: VersionDatabase,
    watchdog: Option<Watchdog>,
}

impl OtaUpdater {
    pub fn new(config: &OtaConfig) -> Result<Self, OtaError> {
        let token = config.token();
        let github = GitHubClient::new(
            &config.api_url,
            config.github_user.as_deref(),
            token.as_deref(),
            config.request_timeout(),
        )?;

        let mut entries = Vec::new();
        for (repository, files) in &config.repositories {
            for file in files {
                let url = github.contents_url(repository, file);
                entries.push(OtaEntry::new(repository, file, url, &config.install_dir));
            }
        }

        let db = VersionDatabase::new(config.install_dir.join(&config.versions_file));
        db.sync(
            entries
                .iter()
                .map(|entry| (entry.filename.as_str(), entry.to_record())),
        )?;

        Ok(Self {
            github,
            entries,
            db,
            watchdog: None,
        })
    }

    /// Feed `watchdog` after every GitHub request, so a check over many files
    /// does not starve it.
    pub fn watching(mut self, watchdog: Watchdog) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    pub fn entries(&self) -> &[OtaEntry] {
        &self.entries
    }

    pub fn database(&self) -> &VersionDatabase {
        &self.db
    }

    /// Ask GitHub for the latest version of every tracked file, staging the
    /// ones that changed.
    pub async fn fetch_updates(&mut self) -> Result<(), OtaError> {
        for entry in self.entries.iter_mut() {
            update_latest(&self.github, self.watchdog.as_ref(), entry).await?;
        }
        Ok(())
    }

    /// Install every newer file. Returns true if anything was replaced, in
    /// which case the daemon has to restart to pick it up.
    pub async fn updated(&mut self) -> Result<bool, OtaError> {
        info!("OTA: checking for updates");

        match self.fetch_updates().await {
            Ok(()) => {}
            Err(e @ OtaError::Validation { .. }) => {
                warn!("OTA: {}. Cannot update", e);
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        let mut installed = false;
        for entry in self.entries.iter_mut() {
            if !entry.new_version_available() {
                continue;
            }

            info!("OTA: {} updated", entry.filename);
            info!("OTA: current: {}", entry.current.as_deref().unwrap_or("-"));
            info!("OTA: latest:  {}", entry.latest.as_deref().unwrap_or("-"));

            set_current_to_latest(entry)?;
            self.db.update(&entry.filename, entry.to_record())?;
            installed = true;
        }

        Ok(installed)
    }
}

async fn update_latest(
    github: &GitHubClient,
    watchdog: Option<&Watchdog>,
    entry: &mut OtaEntry,
) -> Result<(), OtaError> {
    let response = github.get(&entry.url).await;
    feed(watchdog);
    let response = response?;
    let Some(sha) = response.sha.clone() else {
        warn!(
            "OTA: no version for {}: {}",
            entry.filename,
            response.message.as_deref().unwrap_or("unexpected response")
        );
        return Ok(());
    };

    entry.latest = Some(sha.clone());
    if !entry.new_version_available() {
        return Ok(());
    }

    let data = match inline_content(&response) {
        Some(content) => decode_content(&entry.filename, content)?,
        // Files over a megabyte come without inline content
        None => {
            let blob = github.get(&github.blob_url(&entry.repository, &sha)).await;
            feed(watchdog);
            let blob = blob?;
            let content = inline_content(&blob).ok_or_else(|| OtaError::Validation {
                file: entry.filename.clone(),
                reason: "GitHub returned no content".to_string(),
            })?;
            decode_content(&entry.filename, content)?
        }
    };

    let staged = entry.prefixed_path(LATEST_FILE_PREFIX);
    if let Some(parent) = staged.parent() {
        fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }
    fs::write(&staged, &data).map_err(|source| io_error(&staged, source))?;

    if let Err(reason) = validate::validate_file(&staged) {
        // Keep a copy for forensics
        let error_file = entry.prefixed_path(ERROR_FILE_PREFIX);
        fs::rename(&staged, &error_file).map_err(|source| io_error(&error_file, source))?;
        entry.staged = None;
        return Err(OtaError::Validation {
            file: entry.filename.clone(),
            reason,
        });
    }

    entry.staged = Some(staged);
    Ok(())
}

fn feed(watchdog: Option<&Watchdog>) {
    if let Some(watchdog) = watchdog {
        watchdog.feed();
    }
}

fn inline_content(contents: &Contents) -> Option<&str> {
    match (contents.content.as_deref(), contents.encoding.as_deref()) {
        (Some(content), Some("base64") | None) if !content.is_empty() => Some(content),
        _ => None,
    }
}

fn set_current_to_latest(entry: &mut OtaEntry) -> Result<(), OtaError> {
    if let Some(staged) = entry.staged.take() {
        fs::rename(&staged, &entry.target).map_err(|source| io_error(&entry.target, source))?;
    }
    entry.current = entry.latest.clone();
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> OtaError {
    OtaError::Io {
        path: path.to_path_buf(),
        source,
    }
}
