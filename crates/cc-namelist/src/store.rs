//! Per-case namelist store.
//!
//! Files enter the cache only through [`NamelistStore::get`], which reads
//! them from the case directory on first reference. Every later `get`
//! returns the same in-memory copy; nothing reaches disk until `write` or
//! `write_all`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::namelist::Namelist;
use crate::parse::parse_namelist;
use crate::write::render_namelist;
use crate::{NamelistError, NamelistResult};

#[derive(Debug)]
pub struct NamelistStore {
    root_dir: PathBuf,
    files: HashMap<String, Namelist>,
    load_order: Vec<String>,
}

impl NamelistStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            files: HashMap::new(),
            load_order: Vec::new(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root_dir.join(name)
    }

    /// Cached namelist `name`, loading it on first reference.
    pub fn get(&mut self, name: &str) -> NamelistResult<&mut Namelist> {
        if !self.files.contains_key(name) {
            let namelist = self.read(name)?;
            self.files.insert(name.to_string(), namelist);
            self.load_order.push(name.to_string());
        }
        self.files
            .get_mut(name)
            .ok_or_else(|| NamelistError::NotLoaded {
                file: name.to_string(),
            })
    }

    /// Cached namelist without loading.
    pub fn peek(&self, name: &str) -> Option<&Namelist> {
        self.files.get(name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Names of cached files in the order they were loaded.
    pub fn loaded(&self) -> &[String] {
        &self.load_order
    }

    fn read(&self, name: &str) -> NamelistResult<Namelist> {
        let path = self.path_of(name);
        if !path.is_file() {
            return Err(NamelistError::NotFound { path });
        }
        let text = fs::read_to_string(&path).map_err(|source| NamelistError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(file = name, path = %path.display(), "loaded namelist");
        parse_namelist(name, &text)
    }

    /// Persist exactly the namelist `name`, which must have been loaded.
    pub fn write(&self, name: &str) -> NamelistResult<()> {
        let namelist = self.files.get(name).ok_or_else(|| NamelistError::NotLoaded {
            file: name.to_string(),
        })?;
        let path = self.path_of(name);
        fs::write(&path, render_namelist(namelist))
            .map_err(|source| NamelistError::Io { path: path.clone(), source })?;
        debug!(file = name, path = %path.display(), "wrote namelist");
        Ok(())
    }

    /// Persist every namelist loaded so far.
    pub fn write_all(&self) -> NamelistResult<()> {
        for name in &self.load_order {
            self.write(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_once_and_flushes_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("drv_in"), "&ccsm_pes\n lnd_ntasks = 12\n/\n").unwrap();

        let mut store = NamelistStore::new(dir.path());
        assert!(!store.is_loaded("drv_in"));
        store.get("drv_in").unwrap().set("ccsm_pes", "lnd_ntasks", 24).unwrap();

        // Later edits to disk are invisible; the cached copy wins.
        fs::write(dir.path().join("drv_in"), "&ccsm_pes\n lnd_ntasks = 1\n/\n").unwrap();
        assert_eq!(store.get("drv_in").unwrap().int("ccsm_pes", "lnd_ntasks").unwrap(), 24);

        store.write("drv_in").unwrap();
        let mut fresh = NamelistStore::new(dir.path());
        assert_eq!(fresh.get("drv_in").unwrap().int("ccsm_pes", "lnd_ntasks").unwrap(), 24);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = NamelistStore::new(dir.path());
        assert!(matches!(store.get("INPUT_ORG"), Err(NamelistError::NotFound { .. })));
        assert!(store.loaded().is_empty());
    }

    #[test]
    fn write_requires_loaded_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = NamelistStore::new(dir.path());
        assert!(matches!(store.write("INPUT_IO"), Err(NamelistError::NotLoaded { .. })));
    }

    #[test]
    fn write_all_touches_only_loaded_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), "&g\n x = 1\n/\n").unwrap();
        fs::write(dir.path().join("b"), "untouched").unwrap();

        let mut store = NamelistStore::new(dir.path());
        store.get("a").unwrap().set("g", "x", 2).unwrap();
        store.write_all().unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("b")).unwrap(), "untouched");
        assert!(fs::read_to_string(dir.path().join("a")).unwrap().contains("x = 2"));
        assert_eq!(store.loaded(), ["a".to_string()]);
    }
}
