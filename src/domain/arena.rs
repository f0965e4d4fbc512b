//! Arena-backed forest of share-holding nodes.
//!
//! Nodes live in a generational arena and refer to each other by [`NodeId`]:
//! a child stores its parent's id, a parent stores the ordered ids of its
//! children. There are no back-pointers, so the forest is acyclic by
//! construction and trivially copyable into a [`Snapshot`](crate::domain::Snapshot).

use std::fmt;

use generational_arena::{Arena, Index};
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::propagation::{self, ShareWarning};
use crate::domain::rational::Rational;

/// Opaque node identity, unique for the lifetime of the arena that issued it.
///
/// Ids of deleted nodes are never reused for a different node: lookups with
/// a stale id fail with [`DomainError::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Index);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (slot, generation) = self.0.into_raw_parts();
        write!(f, "#{slot}.{generation}")
    }
}

/// A share holder: an original owner (root) or an heir.
#[derive(Debug, Clone)]
pub struct ShareNode {
    pub(crate) name: String,
    /// Current entitlement as a fraction of the whole estate
    pub(crate) share: Rational,
    /// What the parent carved out for this node, scaled in lock-step with `share`
    pub(crate) allocated_share: Rational,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl ShareNode {
    fn new(name: &str, share: Rational, allocated_share: Rational, parent: Option<NodeId>) -> Self {
        Self {
            name: name.to_string(),
            share,
            allocated_share,
            parent,
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn share(&self) -> &Rational {
        &self.share
    }

    pub fn allocated_share(&self) -> &Rational {
        &self.allocated_share
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The forest of original owners and their heirs.
#[derive(Debug, Clone)]
pub struct ShareTree {
    arena: Arena<ShareNode>,
    roots: Vec<NodeId>,
}

impl Default for ShareTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ShareTree {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            roots: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of live nodes in the whole forest.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Original owners, in insertion order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn get(&self, id: NodeId) -> Option<&ShareNode> {
        self.arena.get(id.0)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains(id.0)
    }

    /// Like [`get`](Self::get) but failing with `NotFound`.
    pub fn node(&self, id: NodeId) -> DomainResult<&ShareNode> {
        self.arena
            .get(id.0)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> DomainResult<&mut ShareNode> {
        self.arena
            .get_mut(id.0)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))
    }

    /// Default share offered for the next original owner: `1 / (roots + 1)`.
    pub fn suggested_owner_share(&self) -> Rational {
        let denom = i64::try_from(self.roots.len()).unwrap_or(i64::MAX - 1) + 1;
        Rational::new(1, denom).unwrap_or_else(|_| Rational::zero())
    }

    /// Append a new original owner. Any share value is accepted.
    #[instrument(level = "debug", skip(self, share), fields(share = %share))]
    pub fn add_original_owner(&mut self, name: &str, share: Rational) -> DomainResult<NodeId> {
        validate_name(name)?;
        let node = ShareNode::new(name, share.clone(), share, None);
        let id = NodeId(self.arena.insert(node));
        self.roots.push(id);
        debug!("added original owner {id}");
        Ok(id)
    }

    /// Add an heir under `parent` holding `parent.share * relative_fraction`.
    #[instrument(level = "debug", skip(self, relative_fraction), fields(fraction = %relative_fraction))]
    pub fn add_heir(
        &mut self,
        parent: NodeId,
        name: &str,
        relative_fraction: &Rational,
    ) -> DomainResult<NodeId> {
        validate_name(name)?;
        let heir_share = self.node(parent)?.share() * relative_fraction;
        let node = ShareNode::new(name, heir_share.clone(), heir_share, Some(parent));
        let id = NodeId(self.arena.insert(node));
        self.node_mut(parent)?.children.push(id);
        debug!("added heir {id} under {parent}");
        Ok(id)
    }

    /// Rename a node and set its share relative to its parent (roots: relative to 1).
    ///
    /// Descendants follow the change proportionally. When the old share was zero
    /// no factor exists; descendants are left untouched and a
    /// [`ShareWarning::PropagationIndeterminate`] is returned instead.
    #[instrument(level = "debug", skip(self, new_relative_share), fields(relative = %new_relative_share))]
    pub fn edit_node(
        &mut self,
        id: NodeId,
        new_name: &str,
        new_relative_share: &Rational,
    ) -> DomainResult<Vec<ShareWarning>> {
        validate_name(new_name)?;
        let node = self.node(id)?;
        let old_share = node.share.clone();
        let parent_share = self.parent_share(node)?;

        if parent_share.is_zero() {
            if !old_share.is_zero() {
                return Err(DomainError::invalid(format!(
                    "cannot edit '{}': its parent holds a zero share",
                    node.name
                )));
            }
            // relative share is defined as 0 here; descendants are left alone
            let node = self.node_mut(id)?;
            node.name = new_name.to_string();
            node.share = Rational::zero();
            node.allocated_share = Rational::zero();
            return Ok(Vec::new());
        }

        let new_share = &parent_share * new_relative_share;
        let factor = if old_share.is_zero() || new_share.is_zero() {
            None
        } else {
            Some(new_share.divide(&old_share)?)
        };

        let node = self.node_mut(id)?;
        node.name = new_name.to_string();
        node.share = new_share.clone();
        node.allocated_share = new_share.clone();

        if new_share.is_zero() {
            propagation::collapse(self, id)?;
            Ok(Vec::new())
        } else if let Some(factor) = factor {
            propagation::rescale(self, id, &factor)?;
            Ok(Vec::new())
        } else {
            Ok(propagation::indeterminate(self, id)?.into_iter().collect())
        }
    }

    /// Remove a node and its entire subtree. Returns the number of nodes removed.
    ///
    /// Nothing is handed back to the parent explicitly: its unallocated
    /// remainder grows because the child no longer counts against it.
    #[instrument(level = "debug", skip(self))]
    pub fn delete_node(&mut self, id: NodeId) -> DomainResult<usize> {
        let parent = self.node(id)?.parent;
        let doomed = self.subtree(id)?;
        for node in &doomed {
            self.arena.remove(node.0);
        }
        match parent {
            Some(parent) => self.node_mut(parent)?.children.retain(|c| *c != id),
            None => self.roots.retain(|r| *r != id),
        }
        debug!("deleted {} node(s) rooted at {id}", doomed.len());
        Ok(doomed.len())
    }

    /// Drop the whole forest.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.roots.clear();
    }

    /// Reset every original owner to an equal `1/N` share, rescaling their subtrees.
    #[instrument(level = "debug", skip(self))]
    pub fn rebalance_original_owners(&mut self) -> DomainResult<Vec<ShareWarning>> {
        if self.roots.is_empty() {
            return Ok(Vec::new());
        }
        let count = i64::try_from(self.roots.len())
            .map_err(|_| DomainError::Arithmetic("too many original owners".into()))?;
        let equal = Rational::new(1, count)?;

        let mut warnings = Vec::new();
        for root in self.roots.clone() {
            let old_share = self.node(root)?.share.clone();
            let node = self.node_mut(root)?;
            node.share = equal.clone();
            node.allocated_share = equal.clone();
            if old_share.is_zero() {
                warnings.extend(propagation::indeterminate(self, root)?);
            } else {
                propagation::rescale(self, root, &equal.divide(&old_share)?)?;
            }
        }
        Ok(warnings)
    }

    /// Current share relative to the parent's share (roots: relative to 1).
    pub fn relative_share(&self, id: NodeId) -> DomainResult<Rational> {
        let node = self.node(id)?;
        let parent_share = self.parent_share(node)?;
        match (parent_share.is_zero(), node.share.is_zero()) {
            (true, true) => Ok(Rational::zero()),
            (true, false) => Err(DomainError::invalid(format!(
                "'{}' has a share but its parent holds none",
                node.name
            ))),
            _ => node.share.divide(&parent_share),
        }
    }

    /// `share - Σ children.allocated_share`; negative when over-allocated.
    pub fn unallocated(&self, id: NodeId) -> DomainResult<Rational> {
        let node = self.node(id)?;
        let mut allocated = Rational::zero();
        for child in &node.children {
            allocated = &allocated + &self.node(*child)?.allocated_share;
        }
        Ok(&node.share - &allocated)
    }

    fn parent_share(&self, node: &ShareNode) -> DomainResult<Rational> {
        match node.parent {
            Some(parent) => Ok(self.node(parent)?.share.clone()),
            None => Ok(Rational::one()),
        }
    }

    /// `id` followed by all of its descendants, pre-order.
    pub fn subtree(&self, id: NodeId) -> DomainResult<Vec<NodeId>> {
        self.node(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current)?;
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(out)
    }

    /// All descendants of `id`, pre-order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> DomainResult<Vec<NodeId>> {
        let mut subtree = self.subtree(id)?;
        subtree.remove(0);
        Ok(subtree)
    }

    /// True if `ancestor` lies strictly above `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> DomainResult<bool> {
        let mut current = self.node(id)?.parent;
        while let Some(parent) = current {
            if parent == ancestor {
                return Ok(true);
            }
            current = self.node(parent)?.parent;
        }
        Ok(false)
    }

    /// Dotted 1-based position, e.g. `"2.1"` for the first heir of the second owner.
    pub fn outline_of(&self, id: NodeId) -> DomainResult<String> {
        let mut positions = Vec::new();
        let mut current = id;
        loop {
            let node = self.node(current)?;
            let siblings = match node.parent {
                Some(parent) => self.node(parent)?.children.as_slice(),
                None => self.roots.as_slice(),
            };
            let position = siblings
                .iter()
                .position(|s| *s == current)
                .ok_or_else(|| DomainError::NotFound(current.to_string()))?;
            positions.push(position + 1);
            match node.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Ok(positions.iter().rev().join("."))
    }

    /// Resolve a dotted outline address produced by [`outline_of`](Self::outline_of).
    pub fn find_by_outline(&self, address: &str) -> DomainResult<NodeId> {
        let not_found = || DomainError::NotFound(format!("no node at '{address}'"));
        let mut level = self.roots.as_slice();
        let mut found = None;
        for part in address.trim().split('.') {
            let position: usize = part.parse().map_err(|_| not_found())?;
            let id = *position
                .checked_sub(1)
                .and_then(|i| level.get(i))
                .ok_or_else(not_found)?;
            level = self.node(id)?.children.as_slice();
            found = Some(id);
        }
        found.ok_or_else(not_found)
    }

    /// Longest root-to-leaf path, counted in nodes.
    pub fn depth(&self) -> usize {
        self.iter().map(|(_, depth, _)| depth + 1).max().unwrap_or(0)
    }

    /// Pre-order walk over every tree of the forest, yielding `(id, depth, node)`.
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self)
    }

    /// Insert a node with both share fields given verbatim (snapshot restore).
    pub(crate) fn insert_raw(
        &mut self,
        parent: Option<NodeId>,
        name: &str,
        share: Rational,
        allocated_share: Rational,
    ) -> DomainResult<NodeId> {
        if let Some(parent) = parent {
            self.node(parent)?;
        }
        let id = NodeId(
            self.arena
                .insert(ShareNode::new(name, share, allocated_share, parent)),
        );
        match parent {
            Some(parent) => self.node_mut(parent)?.children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }
}

fn validate_name(name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::invalid("name must not be empty"));
    }
    Ok(())
}

pub struct TreeIterator<'a> {
    tree: &'a ShareTree,
    stack: Vec<(NodeId, usize)>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a ShareTree) -> Self {
        // Push roots in reverse order for left-to-right traversal
        let stack = tree.roots.iter().rev().map(|r| (*r, 0)).collect();
        Self { tree, stack }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (NodeId, usize, &'a ShareNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current, depth)) = self.stack.pop() {
            if let Some(node) = self.tree.get(current) {
                for &child in node.children.iter().rev() {
                    self.stack.push((child, depth + 1));
                }
                return Some((current, depth, node));
            }
        }
        None
    }
}
