//! The stage/commit protocol, layered over any DataStore.

use chrono::Utc;
use log::{debug, info, warn};
use model::Tree;
use snafu::{ensure, OptionExt};
use std::sync::{Mutex, MutexGuard};

use super::revision::generate_id;
use super::{
    error, AuditEntry, AuditEvent, CommitRecord, DataStore, Result, Revision, Slot, StageReceipt,
    StateView,
};

const REVISION_ID_PREFIX: &str = "rev";
const COMMIT_ID_PREFIX: &str = "cmt";

/// A transactional configuration register.  Every operation takes the same lock, so stage,
/// commit, and state reads against one store never interleave.
#[derive(Debug)]
pub struct RevisionStore<D: DataStore> {
    datastore: Mutex<D>,
}

impl<D: DataStore> RevisionStore<D> {
    /// Wraps the given datastore, first repairing what a crash partway through `commit` can
    /// leave behind: an active revision with no commit record, and a staged slot still holding
    /// the revision that was activated.  Each repair is audited as a recovery.
    pub fn open(mut datastore: D) -> Result<Self> {
        if let Some(active) = datastore.read_revision(Slot::Active)? {
            recover_commit_record(&mut datastore, &active)?;

            if let Some(staged) = datastore.read_revision(Slot::Staged)? {
                if staged.revision_id == active.revision_id {
                    warn!(
                        "Revision {} is both staged and active; clearing staged slot left by an interrupted commit",
                        staged.revision_id
                    );
                    datastore.clear_revision(Slot::Staged)?;
                    datastore.append_audit(&AuditEntry {
                        event: AuditEvent::Recover,
                        actor: staged.actor,
                        revision_id: Some(staged.revision_id),
                        commit_id: None,
                        timestamp: Utc::now(),
                    })?;
                }
            }
        }

        Ok(Self::new(datastore))
    }

    /// Wraps the given datastore as found, without repairs.  Meant for readers that must not
    /// write, such as a process holding only a shared lock on the state directory.
    pub fn new(datastore: D) -> Self {
        Self {
            datastore: Mutex::new(datastore),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, D>> {
        self.datastore.lock().ok().context(error::StoreLockSnafu)
    }

    /// Replaces the staged slot with a new revision holding `changes`.  An empty actor is
    /// recorded as unknown.
    pub fn stage<S: AsRef<str>>(&self, actor: S, changes: Tree) -> Result<StageReceipt> {
        let actor = normalize_actor(actor.as_ref());
        let mut datastore = self.lock()?;

        let now = Utc::now();
        let revision = Revision {
            revision_id: generate_id(REVISION_ID_PREFIX, now),
            actor: actor.clone(),
            changes,
            created_at: now,
        };

        datastore.write_revision(Slot::Staged, &revision)?;
        datastore.append_audit(&AuditEntry {
            event: AuditEvent::Configure,
            actor,
            revision_id: Some(revision.revision_id.clone()),
            commit_id: None,
            timestamp: now,
        })?;

        info!("Staged revision {}", revision.revision_id);
        Ok(StageReceipt {
            revision_id: revision.revision_id,
            status: "staged",
            validated: true,
            timestamp: now,
        })
    }

    /// Promotes the staged revision to active.
    ///
    /// If `expected_revision_id` is given (and not blank) it must name the currently staged
    /// revision, so a caller can't commit something another stager slipped in after it read
    /// state.
    pub fn commit<S: AsRef<str>>(
        &self,
        actor: S,
        expected_revision_id: Option<&str>,
    ) -> Result<CommitRecord> {
        let actor = normalize_actor(actor.as_ref());
        let mut datastore = self.lock()?;

        let staged = datastore
            .read_revision(Slot::Staged)?
            .context(error::NoStagedRevisionSnafu)?;

        if let Some(expected) = expected_revision_id.map(str::trim).filter(|e| !e.is_empty()) {
            ensure!(
                expected == staged.revision_id,
                error::RevisionMismatchSnafu {
                    expected,
                    staged: &staged.revision_id,
                }
            );
        }

        let now = Utc::now();
        let record = CommitRecord {
            commit_id: generate_id(COMMIT_ID_PREFIX, now),
            revision_id: staged.revision_id.clone(),
            actor: actor.clone(),
            committed_at: now,
        };

        // Order matters: once active is written the commit has happened.  If a crash cuts the
        // rest short, `open` writes the missing commit record and clears the staged slot; the
        // commit's own audit entry is lost, and the recovery entries stand in for it.
        debug!("Activating revision {}", staged.revision_id);
        datastore.write_revision(Slot::Active, &staged)?;
        datastore.append_commit(&record)?;
        datastore.append_audit(&AuditEntry {
            event: AuditEvent::Commit,
            actor,
            revision_id: Some(record.revision_id.clone()),
            commit_id: Some(record.commit_id.clone()),
            timestamp: now,
        })?;
        datastore.clear_revision(Slot::Staged)?;

        info!(
            "Committed revision {} as {}",
            record.revision_id, record.commit_id
        );
        Ok(record)
    }

    /// Reads both slots and the commit history.
    pub fn state(&self) -> Result<StateView> {
        let datastore = self.lock()?;
        let history = datastore.commit_history()?;
        Ok(StateView {
            staged: datastore.read_revision(Slot::Staged)?,
            active: datastore.read_revision(Slot::Active)?,
            history_size: history.len(),
            last_commit: history.into_iter().last(),
        })
    }

    /// Reads just the active revision.
    pub fn active(&self) -> Result<Option<Revision>> {
        self.lock()?.read_revision(Slot::Active)
    }

    pub fn into_inner(self) -> Result<D> {
        self.datastore.into_inner().ok().context(error::StoreLockSnafu)
    }
}

/// Records a commit for an active revision whose commit record was never written.  Who
/// committed it died with the crash.
fn recover_commit_record<D: DataStore>(datastore: &mut D, active: &Revision) -> Result<()> {
    let history = datastore.commit_history()?;
    if history.last().map(|r| r.revision_id.as_str()) == Some(active.revision_id.as_str()) {
        return Ok(());
    }

    let now = Utc::now();
    let record = CommitRecord {
        commit_id: generate_id(COMMIT_ID_PREFIX, now),
        revision_id: active.revision_id.clone(),
        actor: constants::UNKNOWN_ACTOR.to_string(),
        committed_at: now,
    };
    warn!(
        "Active revision {} has no commit record; recording it as {}",
        record.revision_id, record.commit_id
    );
    datastore.append_commit(&record)?;
    datastore.append_audit(&AuditEntry {
        event: AuditEvent::Recover,
        actor: record.actor,
        revision_id: Some(record.revision_id),
        commit_id: Some(record.commit_id),
        timestamp: now,
    })
}

fn normalize_actor(actor: &str) -> String {
    let actor = actor.trim();
    if actor.is_empty() {
        constants::UNKNOWN_ACTOR.to_string()
    } else {
        actor.to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Error, MemoryDataStore};
    use maplit::btreemap;
    use model::Value;
    use std::collections::HashSet;

    fn changes(key: &str, value: i64) -> Tree {
        btreemap! { key.to_string() => Value::from(value) }
    }

    fn new_store() -> RevisionStore<MemoryDataStore> {
        RevisionStore::open(MemoryDataStore::new()).unwrap()
    }

    #[test]
    fn stage_commit_round_trip() {
        let store = new_store();
        let receipt = store.stage("ops", changes("a", 1)).unwrap();
        assert_eq!(receipt.status, "staged");
        assert!(receipt.validated);
        assert!(receipt.revision_id.starts_with("rev_"));

        let record = store.commit("ops", None).unwrap();
        assert!(record.commit_id.starts_with("cmt_"));
        assert_eq!(record.revision_id, receipt.revision_id);

        let state = store.state().unwrap();
        assert_eq!(state.staged, None);
        let active = state.active.unwrap();
        assert_eq!(active.changes, changes("a", 1));
        assert_eq!(active.revision_id, receipt.revision_id);
        assert_eq!(state.history_size, 1);
        assert_eq!(state.last_commit, Some(record));
    }

    #[test]
    fn commit_without_stage() {
        let store = new_store();
        let err = store.commit("ops", None).unwrap_err();
        assert!(matches!(err, Error::NoStagedRevision));
        assert!(err.is_conflict());
        assert_eq!(err.status_code(), http::StatusCode::CONFLICT);

        let state = store.state().unwrap();
        assert_eq!(state.history_size, 0);
        assert_eq!(state.last_commit, None);
    }

    #[test]
    fn stale_expected_revision() {
        let store = new_store();
        let r1 = store.stage("alice", changes("a", 1)).unwrap();
        let r2 = store.stage("bob", changes("a", 2)).unwrap();
        assert_ne!(r1.revision_id, r2.revision_id);

        let err = store.commit("alice", Some(&r1.revision_id)).unwrap_err();
        match &err {
            Error::RevisionMismatch { expected, staged } => {
                assert_eq!(expected, &r1.revision_id);
                assert_eq!(staged, &r2.revision_id);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(err.status_code(), http::StatusCode::PRECONDITION_FAILED);
        // A failed commit changes nothing.
        assert_eq!(store.state().unwrap().active, None);

        store.commit("bob", Some(&r2.revision_id)).unwrap();
        let active = store.active().unwrap().unwrap();
        assert_eq!(active.changes, changes("a", 2));
    }

    #[test]
    fn omitted_or_blank_expected_revision() {
        let store = new_store();
        store.stage("ops", changes("a", 1)).unwrap();
        store.commit("ops", Some("  ")).unwrap();
        store.stage("ops", changes("a", 2)).unwrap();
        store.commit("ops", None).unwrap();
        assert_eq!(store.state().unwrap().history_size, 2);
    }

    #[test]
    fn staging_replaces() {
        let store = new_store();
        store.stage("ops", changes("a", 1)).unwrap();
        store.stage("ops", changes("b", 2)).unwrap();
        let staged = store.state().unwrap().staged.unwrap();
        assert_eq!(staged.changes, changes("b", 2));
    }

    #[test]
    fn blank_actor_is_unknown() {
        let store = new_store();
        store.stage("", Tree::new()).unwrap();
        assert_eq!(store.state().unwrap().staged.unwrap().actor, "unknown");
        let record = store.commit("  ", None).unwrap();
        assert_eq!(record.actor, "unknown");
    }

    #[test]
    fn ids_not_reused() {
        let store = new_store();
        let mut ids = HashSet::new();
        for n in 0..20 {
            let receipt = store.stage("ops", changes("n", n)).unwrap();
            let record = store.commit("ops", None).unwrap();
            assert!(ids.insert(receipt.revision_id));
            assert!(ids.insert(record.commit_id));
        }
    }

    #[test]
    fn audit_trail() {
        let store = new_store();
        let receipt = store.stage("alice", changes("a", 1)).unwrap();
        let record = store.commit("bob", None).unwrap();

        let datastore = store.into_inner().unwrap();
        let audit = datastore.audit_log();
        assert_eq!(audit.len(), 2);
        assert_eq!(audit[0].event, AuditEvent::Configure);
        assert_eq!(audit[0].actor, "alice");
        assert_eq!(audit[0].revision_id.as_deref(), Some(receipt.revision_id.as_str()));
        assert_eq!(audit[1].event, AuditEvent::Commit);
        assert_eq!(audit[1].actor, "bob");
        assert_eq!(audit[1].commit_id.as_deref(), Some(record.commit_id.as_str()));
    }

    #[test]
    fn open_clears_leftover_staged() {
        let mut datastore = MemoryDataStore::new();
        let rev = Revision {
            revision_id: "rev_1_000000000001".to_string(),
            actor: "ops".to_string(),
            changes: changes("a", 1),
            created_at: Utc::now(),
        };
        datastore.write_revision(Slot::Staged, &rev).unwrap();
        datastore.write_revision(Slot::Active, &rev).unwrap();

        let store = RevisionStore::open(datastore).unwrap();
        let state = store.state().unwrap();
        assert_eq!(state.staged, None);
        assert_eq!(state.active, Some(rev));

        let datastore = store.into_inner().unwrap();
        assert_eq!(datastore.audit_log()[0].event, AuditEvent::Recover);
    }

    #[test]
    fn open_records_missing_commit() {
        let store = new_store();
        store.stage("ops", changes("a", 1)).unwrap();
        let first = store.commit("ops", None).unwrap();

        // Activated, then died before the commit record.
        let mut datastore = store.into_inner().unwrap();
        let rev = Revision {
            revision_id: "rev_2_000000000002".to_string(),
            actor: "alice".to_string(),
            changes: changes("a", 2),
            created_at: Utc::now(),
        };
        datastore.write_revision(Slot::Staged, &rev).unwrap();
        datastore.write_revision(Slot::Active, &rev).unwrap();

        let store = RevisionStore::open(datastore).unwrap();
        let state = store.state().unwrap();
        assert_eq!(state.history_size, 2);
        assert_eq!(state.staged, None);
        let last = state.last_commit.unwrap();
        assert_eq!(last.revision_id, rev.revision_id);
        assert_eq!(last.actor, "unknown");
        assert_ne!(last.commit_id, first.commit_id);

        let datastore = store.into_inner().unwrap();
        let recovered: Vec<_> = datastore
            .audit_log()
            .iter()
            .filter(|e| e.event == AuditEvent::Recover)
            .collect();
        assert_eq!(recovered.len(), 2);
        assert_eq!(recovered[0].commit_id.as_deref(), Some(last.commit_id.as_str()));

        // Nothing left to repair the second time round.
        let store = RevisionStore::open(datastore).unwrap();
        assert_eq!(store.state().unwrap().history_size, 2);
    }

    #[test]
    fn new_leaves_store_as_found() {
        let mut datastore = MemoryDataStore::new();
        let rev = Revision {
            revision_id: "rev_1_000000000001".to_string(),
            actor: "ops".to_string(),
            changes: changes("a", 1),
            created_at: Utc::now(),
        };
        datastore.write_revision(Slot::Staged, &rev).unwrap();
        datastore.write_revision(Slot::Active, &rev).unwrap();

        let store = RevisionStore::new(datastore);
        let state = store.state().unwrap();
        assert_eq!(state.history_size, 0);
        assert!(state.staged.is_some());
        assert!(store.into_inner().unwrap().audit_log().is_empty());
    }

    #[test]
    fn open_keeps_distinct_staged() {
        let store = new_store();
        store.stage("ops", changes("a", 1)).unwrap();
        store.commit("ops", None).unwrap();
        store.stage("ops", changes("a", 2)).unwrap();

        let store = RevisionStore::open(store.into_inner().unwrap()).unwrap();
        assert!(store.state().unwrap().staged.is_some());
    }
}
