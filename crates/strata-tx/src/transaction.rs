//! Namespace-scoped write sessions over one repository.
//!
//! A [`Transaction`] snapshots every live ref into an `orig` namespace
//! and duplicates it into a `changed` namespace under
//! `transactions/{id}/`. The handle exposes the `changed` side through
//! the standard ref/conflict/blob interfaces, so ordinary repository
//! operations run inside the transaction unmodified. At commit time the
//! namespaces are compared and reconciled against the live refs under
//! the repository lock; at abort they are simply discarded.

use std::sync::Arc;
use std::time::Duration;

use strata_model::RevPerson;
use strata_refs::{
    NamespacedRefDatabase, Ref, RefDatabase, HEAD, REFS_PREFIX, STAGE_HEAD, WORK_HEAD,
};
use strata_store::{GraphDatabase, ObjectStore};
use strata_types::ObjectId;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::blobs::{BlobStore, NamespacedBlobStore};
use crate::conflicts::{ConflictStore, NamespacedConflictStore};
use crate::error::{TxError, TxResult};
use crate::reconcile::{merge_commits, rebase_onto, MergeOutcome, RebaseOutcome};

/// Prefix under which all transaction namespaces live.
pub const TRANSACTIONS_PREFIX: &str = "transactions/";

/// Default bounded wait for the repository lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// How a commit reconciles refs that moved outside the transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CommitMode {
    /// Replay the transaction's commits atop the new live tip. The
    /// default for automatic completion.
    #[default]
    Rebase,
    /// Merge the live tip into the transaction's branch, preserving the
    /// transaction-local history. Used by sync-style commits.
    Merge,
}

/// The collaborator bundle a repository hands to its operations.
#[derive(Clone)]
pub struct RepoContext {
    pub refs: Arc<dyn RefDatabase>,
    pub objects: Arc<dyn ObjectStore>,
    pub graph: Arc<dyn GraphDatabase>,
    pub conflicts: Arc<dyn ConflictStore>,
    pub blobs: Arc<dyn BlobStore>,
    /// Set when this context is the namespaced view of an open
    /// transaction.
    pub transaction: Option<Uuid>,
}

impl RepoContext {
    pub fn new(
        refs: Arc<dyn RefDatabase>,
        objects: Arc<dyn ObjectStore>,
        graph: Arc<dyn GraphDatabase>,
        conflicts: Arc<dyn ConflictStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            refs,
            objects,
            graph,
            conflicts,
            blobs,
            transaction: None,
        }
    }
}

/// An isolated write session against a repository.
pub struct Transaction {
    id: Uuid,
    repo: RepoContext,
    orig: Arc<NamespacedRefDatabase>,
    changed: Arc<NamespacedRefDatabase>,
    conflicts: Arc<NamespacedConflictStore>,
    blobs: Arc<NamespacedBlobStore>,
    author: Option<RevPerson>,
    lock_timeout: Duration,
    closed: bool,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("author", &self.author)
            .field("lock_timeout", &self.lock_timeout)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Transaction {
    /// Begin a transaction with the default lock timeout.
    pub fn begin(repo: &RepoContext) -> TxResult<Self> {
        Self::begin_with(repo, DEFAULT_LOCK_TIMEOUT)
    }

    /// Begin a transaction, waiting at most `lock_timeout` for the
    /// repository lock. Snapshots every live ref into the transaction's
    /// `orig` and `changed` namespaces.
    pub fn begin_with(repo: &RepoContext, lock_timeout: Duration) -> TxResult<Self> {
        if repo.transaction.is_some() {
            return Err(TxError::NestedTransaction);
        }
        let id = Uuid::new_v4();
        let orig = Arc::new(NamespacedRefDatabase::new(
            Arc::clone(&repo.refs),
            format!("{TRANSACTIONS_PREFIX}{id}/orig"),
        ));
        let changed = Arc::new(NamespacedRefDatabase::new(
            Arc::clone(&repo.refs),
            format!("{TRANSACTIONS_PREFIX}{id}/changed"),
        ));

        repo.refs.lock(lock_timeout)?;
        let snapshot = (|| -> TxResult<()> {
            for live in repo.refs.get_all("")? {
                if live.name.starts_with(TRANSACTIONS_PREFIX) {
                    continue;
                }
                orig.put(live.clone())?;
                changed.put(live)?;
            }
            Ok(())
        })();
        repo.refs.unlock()?;
        snapshot?;

        debug!(transaction = %id, "transaction begun");
        Ok(Self {
            id,
            repo: repo.clone(),
            orig,
            changed,
            conflicts: Arc::new(NamespacedConflictStore::new(
                Arc::clone(&repo.conflicts),
                format!("{TRANSACTIONS_PREFIX}{id}"),
            )),
            blobs: Arc::new(NamespacedBlobStore::new(
                Arc::clone(&repo.blobs),
                format!("{TRANSACTIONS_PREFIX}{id}"),
            )),
            author: None,
            lock_timeout,
            closed: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }

    /// Author used for merge commits created while committing.
    pub fn set_author(&mut self, author: RevPerson) {
        self.author = Some(author);
    }

    /// The transaction's ref view: every read and write transparently
    /// operates inside the `changed` namespace.
    pub fn refs(&self) -> Arc<dyn RefDatabase> {
        Arc::clone(&self.changed) as Arc<dyn RefDatabase>
    }

    /// The transaction's conflict store.
    pub fn conflicts(&self) -> Arc<dyn ConflictStore> {
        Arc::clone(&self.conflicts) as Arc<dyn ConflictStore>
    }

    /// The transaction's blob store.
    pub fn blobs(&self) -> Arc<dyn BlobStore> {
        Arc::clone(&self.blobs) as Arc<dyn BlobStore>
    }

    /// A repository context scoped to this transaction, for running
    /// ordinary operations against the transaction's state. Beginning
    /// another transaction from it fails with a state error.
    pub fn context(&self) -> RepoContext {
        RepoContext {
            refs: self.refs(),
            objects: Arc::clone(&self.repo.objects),
            graph: Arc::clone(&self.repo.graph),
            conflicts: self.conflicts(),
            blobs: self.blobs(),
            transaction: Some(self.id),
        }
    }

    /// Commit with the default mode ([`CommitMode::Rebase`]).
    pub fn commit(&mut self) -> TxResult<()> {
        self.commit_with(CommitMode::Rebase)
    }

    /// Reconcile the transaction's changed refs into the live ref space
    /// and purge the transaction namespace.
    ///
    /// A reconciliation conflict surfaces as [`TxError::Conflict`] and
    /// leaves the transaction open: the caller resolves the recorded
    /// conflicts and commits again.
    pub fn commit_with(&mut self, mode: CommitMode) -> TxResult<()> {
        self.check_open()?;
        self.repo.refs.lock(self.lock_timeout)?;
        let result = self.reconcile_and_apply(mode);
        let unlock = self.repo.refs.unlock();
        result?;
        unlock?;
        Ok(())
    }

    /// Discard the transaction without touching live refs.
    pub fn abort(&mut self) -> TxResult<()> {
        self.check_open()?;
        self.purge()?;
        self.closed = true;
        debug!(transaction = %self.id, "transaction aborted");
        Ok(())
    }

    fn check_open(&self) -> TxResult<()> {
        if self.closed {
            Err(TxError::TransactionClosed)
        } else {
            Ok(())
        }
    }

    fn reconcile_and_apply(&mut self, mode: CommitMode) -> TxResult<()> {
        let orig: std::collections::BTreeMap<String, Ref> = self
            .orig
            .get_all("")?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();
        let changed: std::collections::BTreeMap<String, Ref> = self
            .changed
            .get_all("")?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        let current_branch: Option<String> = self
            .repo
            .refs
            .get(HEAD)?
            .and_then(|r| r.symbolic_target().map(str::to_string));

        let mut deletes: Vec<String> = Vec::new();
        let mut updates: Vec<Ref> = Vec::new();

        // Refs deleted inside the transaction.
        for (name, orig_ref) in &orig {
            if !name.starts_with(REFS_PREFIX) || changed.contains_key(name) {
                continue;
            }
            if current_branch.as_deref() == Some(name.as_str()) {
                warn!(
                    transaction = %self.id,
                    ref_name = %name,
                    "not deleting the checked-out branch"
                );
                continue;
            }
            match self.repo.refs.get(name)? {
                Some(live) if live.target == orig_ref.target => deletes.push(name.clone()),
                Some(_) => warn!(
                    transaction = %self.id,
                    ref_name = %name,
                    "ref changed outside the transaction, not deleting"
                ),
                None => {}
            }
        }

        // Refs created or updated inside the transaction.
        for (name, changed_ref) in &changed {
            if !name.starts_with(REFS_PREFIX) {
                continue;
            }
            if orig.get(name).map(|o| &o.target) == Some(&changed_ref.target) {
                continue;
            }
            let tx_tip = match changed_ref.object_id() {
                Some(id) => id,
                None => continue,
            };
            let live = self.repo.refs.get(name)?;
            let final_id = match &live {
                // Deleted or never present outside: apply directly.
                None => tx_tip,
                // Unchanged outside since begin: apply directly.
                Some(live_ref) if orig.get(name).map(|o| &o.target) == Some(&live_ref.target) => {
                    tx_tip
                }
                // Moved outside: reconcile.
                Some(live_ref) => {
                    let live_tip = live_ref.object_id().unwrap_or(tx_tip);
                    self.reconcile_tip(name, tx_tip, live_tip, mode)?
                }
            };
            updates.push(Ref::direct(name.clone(), final_id));
            if current_branch.as_deref() == Some(name.as_str()) {
                updates.push(Ref::symbolic(HEAD, name.clone()));
                updates.push(Ref::direct(WORK_HEAD, final_id));
                updates.push(Ref::direct(STAGE_HEAD, final_id));
            }
        }

        for name in deletes {
            self.repo.refs.delete(&name)?;
        }
        self.repo.refs.put_all(updates)?;

        self.purge()?;
        self.closed = true;
        debug!(transaction = %self.id, "transaction committed");
        Ok(())
    }

    /// Reconcile one branch tip against its moved live counterpart.
    /// Conflicts are recorded in the transaction's conflict store before
    /// surfacing, so the caller can inspect and resolve them.
    fn reconcile_tip(
        &self,
        ref_name: &str,
        tx_tip: ObjectId,
        live_tip: ObjectId,
        mode: CommitMode,
    ) -> TxResult<ObjectId> {
        let conflicts = match mode {
            CommitMode::Rebase => {
                match rebase_onto(&self.repo.objects, &self.repo.graph, tx_tip, live_tip)? {
                    RebaseOutcome::Done(id) => return Ok(id),
                    RebaseOutcome::Conflicts(conflicts) => conflicts,
                }
            }
            CommitMode::Merge => {
                match merge_commits(
                    &self.repo.objects,
                    &self.repo.graph,
                    tx_tip,
                    live_tip,
                    self.author.clone(),
                )? {
                    MergeOutcome::Merged(id)
                    | MergeOutcome::FastForward(id)
                    | MergeOutcome::AlreadyUpToDate(id) => return Ok(id),
                    MergeOutcome::Conflicts(conflicts) => conflicts,
                }
            }
        };

        let paths: Vec<String> = conflicts.iter().map(|c| c.path.clone()).collect();
        for conflict in conflicts {
            self.conflicts.add_conflict(conflict)?;
        }
        warn!(
            transaction = %self.id,
            ref_name,
            ?paths,
            "conflicts reconciling transaction, commit aborted"
        );
        Err(TxError::Conflict {
            ref_name: ref_name.to_string(),
            paths,
        })
    }

    fn purge(&self) -> TxResult<()> {
        self.repo
            .refs
            .delete_all(&format!("{TRANSACTIONS_PREFIX}{}/", self.id))?;
        self.conflicts.purge()?;
        self.blobs.purge()?;
        Ok(())
    }
}
