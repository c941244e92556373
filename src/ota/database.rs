use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct VersionRecord {
    pub latest: Option<String>,
    pub current: Option<String>,
}

pub type Versions = BTreeMap<String, VersionRecord>;

/// The versions of every tracked file, kept as a JSON object keyed by file
/// name.
pub struct VersionDatabase {
    path: PathBuf,
}

impl VersionDatabase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// The whole database, `None` if it has not been written yet
    pub fn read(&self) -> Result<Option<Versions>, DatabaseError> {
        if !self.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn read_or_empty(&self) -> Result<Versions, DatabaseError> {
        Ok(self.read()?.unwrap_or_default())
    }

    fn write(&self, data: &Versions) -> Result<(), DatabaseError> {
        fs::write(&self.path, serde_json::to_string(data)?)?;
        Ok(())
    }

    pub fn entry_exists(&self, filename: &str) -> Result<bool, DatabaseError> {
        Ok(self.read_or_empty()?.contains_key(filename))
    }

    pub fn get(&self, filename: &str) -> Result<Option<VersionRecord>, DatabaseError> {
        Ok(self.read_or_empty()?.remove(filename))
    }

    pub fn create(&self, filename: &str, record: VersionRecord) -> Result<(), DatabaseError> {
        let mut data = self.read_or_empty()?;
        if data.contains_key(filename) {
            return Err(DatabaseError::AlreadyExists(filename.to_string()));
        }
        data.insert(filename.to_string(), record);
        self.write(&data)
    }

    pub fn update(&self, filename: &str, record: VersionRecord) -> Result<(), DatabaseError> {
        let mut data = self.read_or_empty()?;
        match data.get_mut(filename) {
            Some(existing) => *existing = record,
            None => return Err(DatabaseError::Missing(filename.to_string())),
        }
        self.write(&data)
    }

    pub fn delete(&self, filename: &str) -> Result<(), DatabaseError> {
        let mut data = self.read_or_empty()?;
        if data.remove(filename).is_none() {
            return Err(DatabaseError::Missing(filename.to_string()));
        }
        self.write(&data)
    }

    /// Add any of `records` the database does not know about yet
    pub fn sync<'a>(
        &self,
        records: impl IntoIterator<Item = (&'a str, VersionRecord)>,
    ) -> Result<(), DatabaseError> {
        let mut data = self.read_or_empty()?;
        let mut changed = !self.exists();
        for (filename, record) in records {
            if !data.contains_key(filename) {
                data.insert(filename.to_string(), record);
                changed = true;
            }
        }
        if changed {
            self.write(&data)?;
        }
        Ok(())
    }
}
