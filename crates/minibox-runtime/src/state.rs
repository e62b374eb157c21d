//! Persistent container records.
//!
//! Each container owns `containers/<id>/container.json`. Writes go to a
//! temporary file that is renamed into place, and every
//! read-modify-write holds an exclusive `flock` on `containers/<id>/.lock`
//! so concurrent invocations against one container serialize.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use minibox_common::constants::{LOCK_FILE, RECORD_FILE};
use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::ContainerId;
use nix::fcntl::{Flock, FlockArg};

use crate::container::Container;

/// Directory of container records.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    /// Creates a store rooted at the containers directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the containers directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory of one container.
    #[must_use]
    pub fn container_dir(&self, id: &ContainerId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Generates a fresh ID and creates its directory.
    ///
    /// The directory is created exclusively, so an ID already taken by
    /// another process is never reused.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn allocate(&self) -> Result<ContainerId> {
        std::fs::create_dir_all(&self.root).map_err(|e| MiniboxError::io(&self.root, e))?;
        loop {
            let id = ContainerId::generate();
            let dir = self.container_dir(&id);
            match std::fs::create_dir(&dir) {
                Ok(()) => {
                    tracing::debug!(id = %id, path = %dir.display(), "container directory created");
                    return Ok(id);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(MiniboxError::io(&dir, e)),
            }
        }
    }

    /// Writes a record, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be taken or the write fails.
    pub fn save(&self, container: &Container) -> Result<()> {
        let _lock = self.lock(&container.id)?;
        self.write(container)
    }

    /// Reads a record.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for an unknown container, or an error if
    /// the record cannot be parsed.
    pub fn load(&self, id: &ContainerId) -> Result<Container> {
        let path = self.container_dir(id).join(RECORD_FILE);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MiniboxError::NotFound {
                    kind: "container",
                    id: id.to_string(),
                }
            } else {
                MiniboxError::io(&path, e)
            }
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Applies `change` to a record under the container's lock and
    /// persists the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be loaded or written.
    pub fn update<F>(&self, id: &ContainerId, change: F) -> Result<Container>
    where
        F: FnOnce(&mut Container),
    {
        let _lock = self.lock(id)?;
        let mut container = self.load(id)?;
        change(&mut container);
        self.write(&container)?;
        Ok(container)
    }

    /// Lists every readable record, oldest first.
    ///
    /// Directories whose record is missing or unparseable are skipped. A
    /// missing containers directory yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the containers directory cannot be read.
    pub fn list(&self) -> Result<Vec<Container>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MiniboxError::io(&self.root, e)),
        };

        let mut containers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MiniboxError::io(&self.root, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match self.load(&ContainerId::new(name)) {
                Ok(container) => containers.push(container),
                Err(e) => tracing::debug!(entry = name, error = %e, "skipping unreadable record"),
            }
        }
        containers.sort_by(|a, b| {
            a.create_time
                .cmp(&b.create_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(containers)
    }

    /// Deletes a container's directory. A missing directory is success.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists and cannot be removed.
    pub fn remove(&self, id: &ContainerId) -> Result<()> {
        let dir = self.container_dir(id);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::debug!(id = %id, "container directory removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MiniboxError::io(&dir, e)),
        }
    }

    fn write(&self, container: &Container) -> Result<()> {
        let dir = self.container_dir(&container.id);
        let path = dir.join(RECORD_FILE);
        let tmp = dir.join(format!("{RECORD_FILE}.tmp"));
        let data = serde_json::to_vec_pretty(container)?;
        std::fs::write(&tmp, data).map_err(|e| MiniboxError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| MiniboxError::io(&path, e))?;
        tracing::debug!(id = %container.id, status = %container.status, "record saved");
        Ok(())
    }

    fn lock(&self, id: &ContainerId) -> Result<Flock<File>> {
        let path = self.container_dir(id).join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MiniboxError::NotFound {
                        kind: "container",
                        id: id.to_string(),
                    }
                } else {
                    MiniboxError::io(&path, e)
                }
            })?;
        Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| {
            MiniboxError::io(&path, std::io::Error::from_raw_os_error(errno as i32))
        })
    }
}

#[cfg(test)]
mod tests {
    use minibox_common::types::ContainerStatus;

    use super::*;

    fn record(store: &RecordStore) -> Container {
        let id = store.allocate().unwrap();
        Container::new(id, "box", "busybox", &["/bin/sh".to_owned()])
    }

    #[test]
    fn save_then_load_returns_same_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let c = record(&store);
        store.save(&c).unwrap();
        assert_eq!(store.load(&c.id).unwrap(), c);
        assert!(!store.container_dir(&c.id).join("container.json.tmp").exists());
    }

    #[test]
    fn load_unknown_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let err = store.load(&ContainerId::new("123")).unwrap_err();
        assert!(matches!(err, MiniboxError::NotFound { kind: "container", .. }));
    }

    #[test]
    fn update_persists_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let c = record(&store);
        store.save(&c).unwrap();

        let updated = store
            .update(&c.id, |c| c.status = ContainerStatus::Stopped)
            .unwrap();

        assert_eq!(updated.status, ContainerStatus::Stopped);
        assert_eq!(store.load(&c.id).unwrap().status, ContainerStatus::Stopped);
    }

    #[test]
    fn update_of_unknown_container_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let err = store.update(&ContainerId::new("9"), |_| {}).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn list_skips_broken_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let good = record(&store);
        store.save(&good).unwrap();
        let broken = store.allocate().unwrap();
        std::fs::write(store.container_dir(&broken).join(RECORD_FILE), "{not json").unwrap();
        let _empty = store.allocate().unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, good.id);
    }

    #[test]
    fn list_of_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let c = record(&store);
        store.remove(&c.id).unwrap();
        store.remove(&c.id).unwrap();
        assert!(!store.container_dir(&c.id).exists());
    }
}
