use std::path::{Path, PathBuf};

use super::{database::VersionRecord, github::git_blob_sha};

pub const LATEST_FILE_PREFIX: &str = "latest_";
pub const ERROR_FILE_PREFIX: &str = "error_";

/// Version metadata for one file tracked in a GitHub repository.
#[derive(Clone, Debug)]
pub struct OtaEntry {
    pub repository: String,
    pub filename: String,
    pub url: String,
    /// Where the file lives on this device
    pub target: PathBuf,
    /// Blob sha of the installed file
    pub current: Option<String>,
    /// Blob sha of the file on GitHub, once fetched
    pub latest: Option<String>,
    pub(crate) staged: Option<PathBuf>,
}

impl OtaEntry {
    pub fn new(repository: &str, filename: &str, url: String, install_dir: &Path) -> Self {
        let target = install_dir.join(filename);
        let current = std::fs::read(&target).ok().map(|data| git_blob_sha(&data));

        Self {
            repository: repository.to_string(),
            filename: filename.to_string(),
            url,
            target,
            current,
            latest: None,
            staged: None,
        }
    }

    pub fn new_version_available(&self) -> bool {
        self.latest.is_some() && self.current != self.latest
    }

    /// A sibling of the target with `prefix` in front of its file name
    pub fn prefixed_path(&self, prefix: &str) -> PathBuf {
        let name = self
            .target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.filename.clone());
        self.target.with_file_name(format!("{}{}", prefix, name))
    }

    pub fn to_record(&self) -> VersionRecord {
        VersionRecord {
            latest: self.latest.clone(),
            current: self.current.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_from_installed_file() {
        let dir = std::env::temp_dir().join(format!("mailbox-entry-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("notes.txt"), "hello world\n").unwrap();

        let installed = OtaEntry::new("o/r", "notes.txt", String::new(), &dir);
        let missing = OtaEntry::new("o/r", "absent.txt", String::new(), &dir);
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(
            installed.current.as_deref(),
            Some("3b18e512dba79e4c8300dd08aeb37f8e728b8dad")
        );
        assert_eq!(missing.current, None);
        assert!(!installed.new_version_available());
    }

    #[test]
    fn test_new_version_and_paths() {
        let mut entry = OtaEntry::new("o/r", "conf/config.ron", String::new(), Path::new("/opt/mailbox"));
        entry.latest = Some("abc".to_string());
        assert!(entry.new_version_available());

        entry.current = Some("abc".to_string());
        assert!(!entry.new_version_available());

        assert_eq!(
            entry.prefixed_path(LATEST_FILE_PREFIX),
            PathBuf::from("/opt/mailbox/conf/latest_config.ron")
        );
        assert_eq!(
            entry.prefixed_path(ERROR_FILE_PREFIX),
            PathBuf::from("/opt/mailbox/conf/error_config.ron")
        );
    }
}
