//! Derivation of final claimants from the forest. Read-only.

use std::fmt;

use tracing::instrument;

use crate::domain::arena::{NodeId, ShareNode, ShareTree};
use crate::domain::error::DomainResult;
use crate::domain::rational::Rational;

/// Why a node is entitled to something.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    /// Leaf node: holds its whole share
    Leaf,
    /// Internal node that kept an unconveyed part of its share
    Retained,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimant {
    pub node: NodeId,
    pub name: String,
    pub share: Rational,
    pub kind: ClaimKind,
}

/// Internal node whose children were allocated more than it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverAllocation {
    pub node: NodeId,
    pub name: String,
    /// `Σ children.allocated_share - share`, always positive
    pub excess: Rational,
}

/// Every leaf (zero shares included) plus every internal node with a positive
/// retained remainder, in pre-order.
#[instrument(level = "debug", skip(tree))]
pub fn resolve(tree: &ShareTree) -> DomainResult<Vec<Claimant>> {
    let mut claimants = Vec::new();
    for (id, _, node) in tree.iter() {
        if node.is_leaf() {
            claimants.push(claim(id, node, node.share().clone(), ClaimKind::Leaf));
            continue;
        }
        let retained = tree.unallocated(id)?;
        if retained.is_positive() {
            claimants.push(claim(id, node, retained, ClaimKind::Retained));
        }
    }
    Ok(claimants)
}

fn claim(id: NodeId, node: &ShareNode, share: Rational, kind: ClaimKind) -> Claimant {
    Claimant {
        node: id,
        name: node.name().to_string(),
        share,
        kind,
    }
}

/// Sum of all claimed shares.
pub fn total_claimed(tree: &ShareTree) -> DomainResult<Rational> {
    Ok(resolve(tree)?.iter().map(|c| &c.share).sum())
}

/// Internal nodes with a negative retained remainder. Reported, never corrected.
pub fn over_allocations(tree: &ShareTree) -> DomainResult<Vec<OverAllocation>> {
    let mut found = Vec::new();
    for (id, _, node) in tree.iter() {
        if node.is_leaf() {
            continue;
        }
        let retained = tree.unallocated(id)?;
        if retained.is_negative() {
            found.push(OverAllocation {
                node: id,
                name: node.name().to_string(),
                excess: -retained,
            });
        }
    }
    Ok(found)
}

/// How the claimed total compares to the whole estate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Balance {
    /// Nothing is claimed at all
    Empty,
    Under,
    Exact,
    Over,
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Balance::Empty => "empty",
            Balance::Under => "under-allocated",
            Balance::Exact => "balanced",
            Balance::Over => "over-allocated",
        };
        write!(f, "{label}")
    }
}

/// Total claimed shares with a display percentage.
#[derive(Debug, Clone, PartialEq)]
pub struct TotalShares {
    pub total: Rational,
    pub percentage: f64,
    pub balance: Balance,
}

impl TotalShares {
    pub fn of(tree: &ShareTree) -> DomainResult<Self> {
        let claimants = resolve(tree)?;
        let total: Rational = claimants.iter().map(|c| &c.share).sum();
        let balance = if claimants.is_empty() {
            Balance::Empty
        } else {
            match total.cmp(&Rational::one()) {
                std::cmp::Ordering::Less => Balance::Under,
                std::cmp::Ordering::Equal => Balance::Exact,
                std::cmp::Ordering::Greater => Balance::Over,
            }
        };
        Ok(Self {
            percentage: total.to_percentage(),
            total,
            balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(text: &str) -> Rational {
        Rational::parse(text).unwrap()
    }

    fn pairs(tree: &ShareTree) -> Vec<(String, String)> {
        resolve(tree)
            .unwrap()
            .into_iter()
            .map(|c| (c.name, c.share.to_canonical_string()))
            .collect()
    }

    #[test]
    fn single_heir_leaves_parent_with_remainder() {
        let mut tree = ShareTree::new();
        let a = tree.add_original_owner("A", r("1")).unwrap();
        tree.add_heir(a, "B", &r("1/2")).unwrap();
        assert_eq!(
            pairs(&tree),
            vec![("A".into(), "1/2".into()), ("B".into(), "1/2".into())]
        );
        assert_eq!(total_claimed(&tree).unwrap(), r("1"));
    }

    #[test]
    fn fully_allocated_parent_is_not_a_claimant() {
        let mut tree = ShareTree::new();
        let a = tree.add_original_owner("A", r("1")).unwrap();
        tree.add_heir(a, "B", &r("1/2")).unwrap();
        tree.add_heir(a, "C", &r("1/2")).unwrap();
        let names: Vec<_> = pairs(&tree).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    #[test]
    fn zero_leaves_are_returned() {
        let mut tree = ShareTree::new();
        tree.add_original_owner("A", Rational::zero()).unwrap();
        let claimants = resolve(&tree).unwrap();
        assert_eq!(claimants.len(), 1);
        assert!(claimants[0].share.is_zero());
        assert_eq!(claimants[0].kind, ClaimKind::Leaf);
    }

    #[test]
    fn over_allocation_is_reported_not_claimed() {
        let mut tree = ShareTree::new();
        let a = tree.add_original_owner("A", r("1")).unwrap();
        tree.add_heir(a, "B", &r("3/4")).unwrap();
        tree.add_heir(a, "C", &r("1/2")).unwrap();
        assert_eq!(total_claimed(&tree).unwrap(), r("5/4"));
        let over = over_allocations(&tree).unwrap();
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].name, "A");
        assert_eq!(over[0].excess, r("1/4"));
    }

    #[test]
    fn total_shares_balance() {
        let mut tree = ShareTree::new();
        assert_eq!(TotalShares::of(&tree).unwrap().balance, Balance::Empty);

        tree.add_original_owner("A", r("1/2")).unwrap();
        let total = TotalShares::of(&tree).unwrap();
        assert_eq!(total.balance, Balance::Under);
        assert_eq!(total.percentage, 50.0);

        tree.add_original_owner("B", r("1/2")).unwrap();
        assert_eq!(TotalShares::of(&tree).unwrap().balance, Balance::Exact);

        tree.add_original_owner("C", r("1/3")).unwrap();
        assert_eq!(TotalShares::of(&tree).unwrap().balance, Balance::Over);
    }
}
