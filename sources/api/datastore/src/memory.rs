//! In-memory datastore for use in testing other modules.
//!
//! Mimics FilesystemDataStore's semantics, including clearing an empty slot being a no-op.

use super::{AuditEntry, CommitRecord, DataStore, Result, Revision, Slot};

#[derive(Debug, Default)]
pub struct MemoryDataStore {
    staged: Option<Revision>,
    active: Option<Revision>,
    commits: Vec<CommitRecord>,
    audit: Vec<AuditEntry>,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// The audit trail so far, oldest first.
    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<Revision> {
        match slot {
            Slot::Staged => &mut self.staged,
            Slot::Active => &mut self.active,
        }
    }
}

impl DataStore for MemoryDataStore {
    fn read_revision(&self, slot: Slot) -> Result<Option<Revision>> {
        Ok(match slot {
            Slot::Staged => self.staged.clone(),
            Slot::Active => self.active.clone(),
        })
    }

    fn write_revision(&mut self, slot: Slot, revision: &Revision) -> Result<()> {
        *self.slot_mut(slot) = Some(revision.clone());
        Ok(())
    }

    fn clear_revision(&mut self, slot: Slot) -> Result<()> {
        *self.slot_mut(slot) = None;
        Ok(())
    }

    fn append_commit(&mut self, record: &CommitRecord) -> Result<()> {
        self.commits.push(record.clone());
        Ok(())
    }

    fn commit_history(&self) -> Result<Vec<CommitRecord>> {
        Ok(self.commits.clone())
    }

    fn append_audit(&mut self, entry: &AuditEntry) -> Result<()> {
        self.audit.push(entry.clone());
        Ok(())
    }
}
