//! Commit, tag, and identity metadata objects.

use serde::{Deserialize, Serialize};
use strata_types::ObjectId;

use crate::hash;

/// The identity and timestamp of a commit author, committer, or tagger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevPerson {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Timezone offset from UTC, in minutes.
    pub tz_offset: i32,
}

impl RevPerson {
    pub fn new(name: impl Into<String>, email: impl Into<String>, timestamp: i64) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
            timestamp,
            tz_offset: 0,
        }
    }

    /// An anonymous person with only a timestamp.
    pub fn anonymous(timestamp: i64) -> Self {
        Self {
            name: None,
            email: None,
            timestamp,
            tz_offset: 0,
        }
    }
}

/// A commit: an immutable pointer to one root tree snapshot plus its
/// parent commits and authorship metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevCommit {
    /// The root tree this commit snapshots.
    pub tree: ObjectId,
    /// Parent commit ids; empty for a root commit, two for a merge.
    pub parents: Vec<ObjectId>,
    pub author: RevPerson,
    pub committer: RevPerson,
    pub message: String,
}

impl RevCommit {
    pub fn new(
        tree: ObjectId,
        parents: Vec<ObjectId>,
        author: RevPerson,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            parents,
            committer: author.clone(),
            author,
            message: message.into(),
        }
    }

    /// The content-addressed id of this commit.
    pub fn id(&self) -> ObjectId {
        hash::hash_commit(self)
    }

    /// The first parent, the one a linear history follows.
    pub fn parent(&self) -> Option<ObjectId> {
        self.parents.first().copied()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// An immutable, annotated pointer to a commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevTag {
    pub name: String,
    /// The commit this tag points at.
    pub target: ObjectId,
    pub tagger: RevPerson,
    pub message: String,
}

impl RevTag {
    pub fn new(
        name: impl Into<String>,
        target: ObjectId,
        tagger: RevPerson,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target,
            tagger,
            message: message.into(),
        }
    }

    /// The content-addressed id of this tag.
    pub fn id(&self) -> ObjectId {
        hash::hash_tag(self)
    }
}
