//! Deep copies of the forest for undo and persistence.
//!
//! A [`Snapshot`] is a plain pre-order list of [`NodeRecord`]s, independent of
//! any live [`NodeId`](crate::domain::NodeId): each parent record precedes its
//! children, and shares travel as canonical fraction strings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::arena::ShareTree;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::rational::Rational;

/// One node in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    /// Parent record id; serialized as `""` for original owners
    #[serde(default, with = "parent_id")]
    pub parent: Option<String>,
    pub name: String,
    pub share: Rational,
    pub allocated_share: Rational,
}

mod parent_id {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(parent: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(parent.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.filter(|p| !p.is_empty()))
    }
}

/// Full copy of a forest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    records: Vec<NodeRecord>,
}

impl Snapshot {
    pub fn from_records(records: Vec<NodeRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[NodeRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<NodeRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copy `tree` in pre-order. Record ids are outline addresses (`"1"`, `"1.2"`).
    #[instrument(level = "trace", skip(tree))]
    pub fn capture(tree: &ShareTree) -> DomainResult<Self> {
        let mut records = Vec::with_capacity(tree.len());
        let mut ids: HashMap<_, String> = HashMap::with_capacity(tree.len());
        let mut counters: HashMap<Option<String>, usize> = HashMap::new();

        for (id, _, node) in tree.iter() {
            let parent = match node.parent() {
                Some(p) => Some(
                    ids.get(&p)
                        .cloned()
                        .ok_or_else(|| DomainError::NotFound(p.to_string()))?,
                ),
                None => None,
            };
            let position = counters.entry(parent.clone()).or_insert(0);
            *position += 1;
            let record_id = match &parent {
                Some(p) => format!("{p}.{position}"),
                None => position.to_string(),
            };
            ids.insert(id, record_id.clone());
            records.push(NodeRecord {
                id: record_id,
                parent,
                name: node.name().to_string(),
                share: node.share().clone(),
                allocated_share: node.allocated_share().clone(),
            });
        }
        Ok(Self { records })
    }

    /// Rebuild a fresh forest with new node identities.
    ///
    /// Fails with `NotFound` when a record names a parent that has not been
    /// seen yet, and with `InvalidOperation` on duplicate record ids.
    #[instrument(level = "trace", skip(self), fields(records = self.records.len()))]
    pub fn restore(&self) -> DomainResult<ShareTree> {
        let mut tree = ShareTree::new();
        let mut ids = HashMap::with_capacity(self.records.len());

        for record in &self.records {
            let parent = match &record.parent {
                Some(p) => Some(*ids.get(p.as_str()).ok_or_else(|| {
                    DomainError::NotFound(format!(
                        "parent '{p}' of record '{}' (records must be in pre-order)",
                        record.id
                    ))
                })?),
                None => None,
            };
            let id = tree.insert_raw(
                parent,
                &record.name,
                record.share.clone(),
                record.allocated_share.clone(),
            )?;
            if ids.insert(record.id.as_str(), id).is_some() {
                return Err(DomainError::invalid(format!(
                    "duplicate record id '{}'",
                    record.id
                )));
            }
        }
        debug!("restored {} node(s)", tree.len());
        Ok(tree)
    }
}

/// Undo stack of pre-mutation snapshots. Unbounded and never pruned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    stack: Vec<Snapshot>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.stack.push(snapshot);
    }

    pub fn pop(&mut self) -> Option<Snapshot> {
        self.stack.pop()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(text: &str) -> Rational {
        Rational::parse(text).unwrap()
    }

    fn sample() -> ShareTree {
        let mut tree = ShareTree::new();
        let a = tree.add_original_owner("A", r("2/3")).unwrap();
        let b = tree.add_heir(a, "B", &r("1/2")).unwrap();
        tree.add_heir(b, "C", &r("1/5")).unwrap();
        tree.add_heir(a, "D", &r("1/4")).unwrap();
        tree.add_original_owner("E", r("1/3")).unwrap();
        tree
    }

    #[test]
    fn capture_is_preorder_with_outline_ids() {
        let snapshot = Snapshot::capture(&sample()).unwrap();
        let ids: Vec<_> = snapshot
            .records()
            .iter()
            .map(|r| (r.id.as_str(), r.parent.as_deref()))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("1", None),
                ("1.1", Some("1")),
                ("1.1.1", Some("1.1")),
                ("1.2", Some("1")),
                ("2", None),
            ]
        );
    }

    #[test]
    fn restore_preserves_structure_and_both_share_fields() {
        let mut tree = sample();
        // make share and allocated_share diverge
        let a = tree.roots()[0];
        tree.node_mut(a).unwrap().share = r("1/7");

        let snapshot = Snapshot::capture(&tree).unwrap();
        let restored = snapshot.restore().unwrap();

        assert_eq!(Snapshot::capture(&restored).unwrap(), snapshot);
        let root = restored.node(restored.roots()[0]).unwrap();
        assert_eq!(root.share(), &r("1/7"));
        assert_eq!(root.allocated_share(), &r("2/3"));
    }

    #[test]
    fn json_uses_legacy_field_names() {
        let snapshot = Snapshot::capture(&sample()).unwrap();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json[0]["parent"], "");
        assert_eq!(json[0]["share"], "2/3");
        assert_eq!(json[1]["parent"], "1");
        assert_eq!(json[1]["allocated_share"], "1/3");
    }

    #[test]
    fn restore_accepts_foreign_ids() {
        let json = r#"[
            {"id": "I001", "parent": "", "name": "A", "share": "1", "allocated_share": "1"},
            {"id": "I002", "parent": "I001", "name": "B", "share": "1/2", "allocated_share": "1/2"}
        ]"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        let tree = snapshot.restore().unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.node(tree.roots()[0]).unwrap().children().len(), 1);
    }

    #[test]
    fn restore_rejects_child_before_parent() {
        let snapshot = Snapshot::from_records(vec![NodeRecord {
            id: "2".into(),
            parent: Some("1".into()),
            name: "B".into(),
            share: r("1/2"),
            allocated_share: r("1/2"),
        }]);
        assert!(matches!(
            snapshot.restore().unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    #[test]
    fn restore_rejects_duplicate_ids() {
        let record = NodeRecord {
            id: "1".into(),
            parent: None,
            name: "A".into(),
            share: r("1"),
            allocated_share: r("1"),
        };
        let snapshot = Snapshot::from_records(vec![record.clone(), record]);
        assert!(matches!(
            snapshot.restore().unwrap_err(),
            DomainError::InvalidOperation(_)
        ));
    }

    #[test]
    fn malformed_share_text_fails_to_load() {
        let json = r#"[{"id": "1", "parent": "", "name": "A", "share": "1/0", "allocated_share": "1"}]"#;
        assert!(serde_json::from_str::<Snapshot>(json).is_err());
    }

    #[test]
    fn history_is_lifo() {
        let mut history = History::new();
        assert!(history.pop().is_none());
        history.push(Snapshot::default());
        history.push(Snapshot::capture(&sample()).unwrap());
        assert_eq!(history.len(), 2);
        assert_eq!(history.pop().unwrap().len(), 5);
        assert!(history.pop().unwrap().is_empty());
        assert!(history.is_empty());
    }
}
