//! Content revisions attached to activities and templates.
//!
//! A record's `revisions` field is write-once from the client's point of view:
//! anything sent there is created as a new revision. `Revisions` therefore
//! keeps two slots. `pending` holds a revision that has not been submitted yet
//! and is the only thing serialized. `committed` holds the most recent
//! revision known to exist on the server. Loading a record fills `committed`;
//! `set_latest` fills `pending`; a successful save moves `pending` over to
//! `committed`.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revisions<R> {
    pending: Option<R>,
    committed: Option<R>,
}

impl<R> Default for Revisions<R> {
    fn default() -> Self {
        Self {
            pending: None,
            committed: None,
        }
    }
}

impl<R> Revisions<R> {
    /// The revision a reader should see: pending first, then committed.
    pub fn latest(&self) -> Option<&R> {
        self.pending.as_ref().or(self.committed.as_ref())
    }

    /// Stage a new revision for the next save.
    pub fn set_latest(&mut self, revision: R) {
        self.pending = Some(revision);
    }

    pub fn pending(&self) -> Option<&R> {
        self.pending.as_ref()
    }

    pub fn committed(&self) -> Option<&R> {
        self.committed.as_ref()
    }

    /// True while a staged revision has not been saved.
    pub fn is_unsaved(&self) -> bool {
        self.pending.is_some()
    }

    /// Settle after a save. `self` is what the server returned and `submitted`
    /// is what was sent. If the response omits revisions, the submitted one
    /// is now the committed revision.
    pub(crate) fn settle(&mut self, submitted: Revisions<R>) {
        self.pending = None;
        if self.committed.is_none() {
            self.committed = submitted.pending.or(submitted.committed);
        }
    }
}

impl<R: Serialize> Serialize for Revisions<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let pending: Vec<&R> = self.pending.iter().collect();
        pending.serialize(serializer)
    }
}

impl<'de, R: Deserialize<'de>> Deserialize<'de> for Revisions<R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let loaded = Option::<Vec<R>>::deserialize(deserializer)?.unwrap_or_default();
        Ok(Self {
            pending: None,
            committed: loaded.into_iter().next(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loaded_revisions_are_committed_and_not_resent() {
        let revs: Revisions<String> = serde_json::from_str(r#"["v2","v1"]"#).unwrap();
        assert_eq!(revs.committed().map(String::as_str), Some("v2"));
        assert!(!revs.is_unsaved());
        assert_eq!(serde_json::to_string(&revs).unwrap(), "[]");
    }

    #[test]
    fn null_revisions_load_as_empty() {
        let revs: Revisions<String> = serde_json::from_str("null").unwrap();
        assert!(revs.latest().is_none());
    }

    #[test]
    fn pending_wins_over_committed() {
        let mut revs: Revisions<String> = serde_json::from_str(r#"["old"]"#).unwrap();
        revs.set_latest("new".to_string());
        assert!(revs.is_unsaved());
        assert_eq!(revs.latest().map(String::as_str), Some("new"));
        assert_eq!(serde_json::to_string(&revs).unwrap(), r#"["new"]"#);
    }

    #[test]
    fn settle_stashes_submitted_revision_when_response_has_none() {
        let mut submitted = Revisions::default();
        submitted.set_latest("draft".to_string());
        let mut stored: Revisions<String> = Revisions::default();
        stored.settle(submitted);
        assert!(!stored.is_unsaved());
        assert_eq!(stored.committed().map(String::as_str), Some("draft"));
        assert_eq!(serde_json::to_string(&stored).unwrap(), "[]");
    }

    #[test]
    fn settle_prefers_server_copy() {
        let mut submitted = Revisions::default();
        submitted.set_latest("draft".to_string());
        let mut stored: Revisions<String> = serde_json::from_str(r#"["stored"]"#).unwrap();
        stored.settle(submitted);
        assert_eq!(stored.latest().map(String::as_str), Some("stored"));
    }
}
