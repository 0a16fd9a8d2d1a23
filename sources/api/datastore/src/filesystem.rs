//! This implementation of the DataStore trait relies on the filesystem for data storage.
//!
//! Each slot is a single JSON document, replaced by writing a temporary file in the same
//! directory and persisting it over the old one, so readers see either the old or the new
//! document.  The commit history and audit trail are newline-delimited JSON, appended one whole
//! record at a time.
//!
//! Separate processes share a directory through an advisory lock on its lockfile: a writer
//! holds it exclusively for as long as its datastore lives, readers hold it shared.

use fs2::FileExt;
use log::{debug, trace, warn};
use serde::Serialize;
use snafu::ResultExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::{error, AuditEntry, CommitRecord, DataStore, Result, Revision, Slot};

/// What a process means to do with a state directory, and so which lock it takes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Debug)]
pub struct FilesystemDataStore {
    base_path: PathBuf,
    // Held, never read; dropping it releases the lock.
    _lockfile: Option<File>,
}

impl FilesystemDataStore {
    /// A datastore that takes no lock; the caller is the only user of the directory.
    pub fn new<P: AsRef<Path>>(base_path: P) -> FilesystemDataStore {
        FilesystemDataStore {
            base_path: base_path.as_ref().into(),
            _lockfile: None,
        }
    }

    /// Locks the directory for the given access, failing right away if another process holds
    /// a conflicting lock.  The lock lasts as long as the returned datastore.
    pub fn locked<P: AsRef<Path>>(base_path: P, access: Access) -> Result<FilesystemDataStore> {
        let mut datastore = Self::new(base_path);
        datastore.ensure_base_path()?;

        let path = datastore.base_path.join(constants::LOCK_FILE);
        let lockfile = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .context(error::IoSnafu { path: &path })?;
        match access {
            Access::Read => FileExt::try_lock_shared(&lockfile),
            Access::Write => FileExt::try_lock_exclusive(&lockfile),
        }
        .context(error::LockHeldSnafu { path: &path })?;
        debug!("Obtained {:?} lock on {}", access, path.display());

        datastore._lockfile = Some(lockfile);
        Ok(datastore)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn slot_path(&self, slot: Slot) -> PathBuf {
        match slot {
            Slot::Staged => self.base_path.join(constants::STAGED_FILE),
            Slot::Active => self.base_path.join(constants::ACTIVE_FILE),
        }
    }

    fn commits_path(&self) -> PathBuf {
        self.base_path.join(constants::COMMITS_FILE)
    }

    fn audit_path(&self) -> PathBuf {
        self.base_path.join(constants::AUDIT_FILE)
    }

    fn ensure_base_path(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path).context(error::IoSnafu {
            path: &self.base_path,
        })
    }

    /// Writes the whole document to a temporary file next to the target, then renames it into
    /// place.
    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        self.ensure_base_path()?;
        let mut tmp = NamedTempFile::new_in(&self.base_path).context(error::CreateTempfileSnafu {
            path: &self.base_path,
        })?;
        tmp.write_all(data)
            .context(error::IoSnafu { path: tmp.path() })?;
        tmp.as_file()
            .sync_all()
            .context(error::IoSnafu { path: tmp.path() })?;
        tmp.persist(path).context(error::PersistSnafu { path })?;
        trace!("Atomically replaced {}", path.display());
        Ok(())
    }

    /// Appends one record as a single line.
    fn append_line<T: Serialize>(&self, path: &Path, record: &T, given: &str) -> Result<()> {
        self.ensure_base_path()?;
        let mut line =
            serde_json::to_string(record).context(error::SerializationSnafu { given })?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context(error::IoSnafu { path })?;
        // One write per record, so a reader never sees half of one.
        file.write_all(line.as_bytes())
            .context(error::IoSnafu { path })
    }
}

/// Helper for reading a file that may legitimately not exist yet.
fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).context(error::IoSnafu { path }),
    }
}

impl DataStore for FilesystemDataStore {
    fn read_revision(&self, slot: Slot) -> Result<Option<Revision>> {
        let path = self.slot_path(slot);
        let data = match read_optional(&path)? {
            Some(data) => data,
            None => return Ok(None),
        };
        let revision = serde_json::from_str(&data).map_err(|e| error::Error::Corruption {
            msg: format!("unreadable revision document: {}", e),
            path: path.clone(),
        })?;
        Ok(Some(revision))
    }

    fn write_revision(&mut self, slot: Slot, revision: &Revision) -> Result<()> {
        let mut data = serde_json::to_string_pretty(revision).context(
            error::SerializationSnafu {
                given: format!("revision {}", revision.revision_id),
            },
        )?;
        data.push('\n');
        debug!("Writing revision {} to {:?} slot", revision.revision_id, slot);
        self.write_atomic(&self.slot_path(slot), data.as_bytes())
    }

    fn clear_revision(&mut self, slot: Slot) -> Result<()> {
        let path = self.slot_path(slot);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context(error::IoSnafu { path }),
        }
    }

    fn append_commit(&mut self, record: &CommitRecord) -> Result<()> {
        self.append_line(&self.commits_path(), record, "commit record")
    }

    /// A line that doesn't parse is skipped with a warning rather than failing the read; the
    /// only way to get one is a torn final append, and the slots stay authoritative.
    fn commit_history(&self) -> Result<Vec<CommitRecord>> {
        let path = self.commits_path();
        let data = match read_optional(&path)? {
            Some(data) => data,
            None => return Ok(Vec::new()),
        };

        let mut records = Vec::new();
        for (i, line) in data.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping unreadable line {} of {}: {}",
                    i + 1,
                    path.display(),
                    e
                ),
            }
        }
        Ok(records)
    }

    fn append_audit(&mut self, entry: &AuditEntry) -> Result<()> {
        self.append_line(&self.audit_path(), entry, "audit entry")
    }
}
