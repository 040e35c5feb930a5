//! Named references: direct and symbolic pointers into history.

use serde::{Deserialize, Serialize};
use strata_types::ObjectId;

/// Name of the symbolic ref pointing at the checked-out branch.
pub const HEAD: &str = "HEAD";
/// Ref tracking the root tree of the working copy.
pub const WORK_HEAD: &str = "WORK_HEAD";
/// Ref tracking the root tree of the staging area.
pub const STAGE_HEAD: &str = "STAGE_HEAD";
/// Prefix of all branch and tag refs.
pub const REFS_PREFIX: &str = "refs/";
/// Prefix of branch refs.
pub const HEADS_PREFIX: &str = "refs/heads/";
/// Prefix of tag refs.
pub const TAGS_PREFIX: &str = "refs/tags/";

/// What a ref points at: an object directly, or another ref by name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefTarget {
    Direct(ObjectId),
    Symbolic(String),
}

/// A named reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    pub name: String,
    pub target: RefTarget,
}

impl Ref {
    /// A ref pointing directly at an object.
    pub fn direct(name: impl Into<String>, target: ObjectId) -> Self {
        Self {
            name: name.into(),
            target: RefTarget::Direct(target),
        }
    }

    /// A symbolic ref pointing at another ref by name.
    pub fn symbolic(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: RefTarget::Symbolic(target.into()),
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self.target, RefTarget::Symbolic(_))
    }

    /// The object id of a direct ref, `None` for symbolic refs.
    pub fn object_id(&self) -> Option<ObjectId> {
        match &self.target {
            RefTarget::Direct(id) => Some(*id),
            RefTarget::Symbolic(_) => None,
        }
    }

    /// The target ref name of a symbolic ref.
    pub fn symbolic_target(&self) -> Option<&str> {
        match &self.target {
            RefTarget::Direct(_) => None,
            RefTarget::Symbolic(name) => Some(name),
        }
    }

    /// Returns `true` if the name lies under the given prefix.
    pub fn is_child_of(&self, prefix: &str) -> bool {
        self.name.starts_with(prefix)
    }

    /// The last component of the ref name (e.g. `main` for
    /// `refs/heads/main`).
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// The before/after descriptor returned by every ref mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefChange {
    pub name: String,
    pub old: Option<Ref>,
    pub new: Option<Ref>,
}

impl RefChange {
    pub fn new(name: impl Into<String>, old: Option<Ref>, new: Option<Ref>) -> Self {
        Self {
            name: name.into(),
            old,
            new,
        }
    }

    /// The ref did not exist before this mutation.
    pub fn is_create(&self) -> bool {
        self.old.is_none() && self.new.is_some()
    }

    /// The ref no longer exists after this mutation.
    pub fn is_delete(&self) -> bool {
        self.old.is_some() && self.new.is_none()
    }

    /// The mutation changed an existing ref's target.
    pub fn is_update(&self) -> bool {
        match (&self.old, &self.new) {
            (Some(old), Some(new)) => old != new,
            _ => false,
        }
    }

    /// Whether the mutation changed anything at all.
    pub fn changed(&self) -> bool {
        self.old != self.new
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_ref_accessors() {
        let id = ObjectId::hash_of(b"commit");
        let r = Ref::direct("refs/heads/main", id);
        assert!(!r.is_symbolic());
        assert_eq!(r.object_id(), Some(id));
        assert_eq!(r.symbolic_target(), None);
        assert_eq!(r.short_name(), "main");
        assert!(r.is_child_of(HEADS_PREFIX));
    }

    #[test]
    fn symbolic_ref_accessors() {
        let head = Ref::symbolic(HEAD, "refs/heads/main");
        assert!(head.is_symbolic());
        assert_eq!(head.object_id(), None);
        assert_eq!(head.symbolic_target(), Some("refs/heads/main"));
    }

    #[test]
    fn change_classification() {
        let id = ObjectId::hash_of(b"c1");
        let id2 = ObjectId::hash_of(b"c2");
        let r1 = Ref::direct("refs/heads/main", id);
        let r2 = Ref::direct("refs/heads/main", id2);

        let create = RefChange::new("refs/heads/main", None, Some(r1.clone()));
        assert!(create.is_create() && !create.is_delete() && !create.is_update());
        assert!(create.changed());

        let update = RefChange::new("refs/heads/main", Some(r1.clone()), Some(r2));
        assert!(update.is_update());

        let delete = RefChange::new("refs/heads/main", Some(r1.clone()), None);
        assert!(delete.is_delete());

        let noop = RefChange::new("refs/heads/main", Some(r1.clone()), Some(r1));
        assert!(!noop.changed());
    }
}
