/*!
# Background

The revision store is the gateway's transactional configuration register.
Operators stage a complete candidate configuration, then commit it; commit promotes the staged
revision to active in one step and records the promotion in an append-only history.

There is at most one staged and one active revision at any time.
Staging replaces the staged slot outright; it never merges with what was there.

# Library

This library provides a trait defining the exact storage requirements, along with
implementations for the filesystem (what the appliance uses) and memory (what tests use).

[`RevisionStore`] layers the stage/commit protocol on top of any [`DataStore`]:
* `stage` generates a fresh revision ID, persists the staged slot, and audits the event.
* `commit` checks the optional expected revision ID against the staged slot, copies the staged
  revision to the active slot, appends a commit record, audits, and finally clears the staged
  slot.
* `state` reads everything without changing anything.

All three run in one critical section per store.  Across processes, `FilesystemDataStore::locked`
takes an advisory lock on the state directory: exclusive for writers, shared for readers.

# On-disk layout

`FilesystemDataStore` keeps everything in one directory:
* `staged.json`, `active.json`: the two slots, each replaced atomically by persisting a
  temporary file over the old one.
* `commits.jsonl`: one commit record per line.
* `audit.log`: one JSON event per line.
* `.lock`: the lockfile, empty.

# Current limitations

* A crash between activating a revision and clearing the staged slot can leave the commit
  unrecorded and both slots holding the same revision; `RevisionStore::open` writes the missing
  commit record (with an unknown actor) and clears the staged slot.
* A process that finds the directory locked fails at once rather than waiting.
* There's no automatic rollback; callers commit an earlier configuration to go back.
*/

pub mod error;
pub mod filesystem;
pub mod memory;
mod revision;
mod store;

pub use error::{Error, Result};
pub use filesystem::{Access, FilesystemDataStore};
pub use memory::MemoryDataStore;
pub use revision::{AuditEntry, AuditEvent, CommitRecord, Revision, StageReceipt, StateView};
pub use store::RevisionStore;

/// Slot represents whether we want to look at the staged (pending) or active (committed)
/// revision.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Slot {
    Staged,
    Active,
}

pub trait DataStore {
    /// Retrieve the revision held in the given slot, if any.
    fn read_revision(&self, slot: Slot) -> Result<Option<Revision>>;
    /// Replace the revision held in the given slot.  Readers must never see a partial write.
    fn write_revision(&mut self, slot: Slot, revision: &Revision) -> Result<()>;
    /// Empty the given slot.  Clearing an empty slot is not an error.
    fn clear_revision(&mut self, slot: Slot) -> Result<()>;

    /// Append a record to the commit history.
    fn append_commit(&mut self, record: &CommitRecord) -> Result<()>;
    /// Return the commit history, oldest first.
    fn commit_history(&self) -> Result<Vec<CommitRecord>>;

    /// Append an event to the audit trail.
    fn append_audit(&mut self, entry: &AuditEntry) -> Result<()>;
}
