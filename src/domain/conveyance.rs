//! Transfer of a node's unallocated remainder to other nodes.
//!
//! Conveyance only moves already-unclaimed value: the source gives up part of
//! its retained remainder and each destination's own share grows by the same
//! amount, so the forest's claimed total is unchanged.

use tracing::{debug, info, instrument};

use crate::domain::arena::{NodeId, ShareTree};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::propagation::{self, ShareWarning};
use crate::domain::rational::Rational;

/// One destination of a conveyance; `portion` is a fraction of the remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conveyance {
    pub destination: NodeId,
    pub portion: Rational,
}

impl Conveyance {
    pub fn new(destination: NodeId, portion: Rational) -> Self {
        Self {
            destination,
            portion,
        }
    }
}

/// What a committed conveyance did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConveyanceOutcome {
    /// Source remainder before the transfer
    pub remainder: Rational,
    /// Absolute amount received by each destination, in request order
    pub transfers: Vec<(NodeId, Rational)>,
    pub warnings: Vec<ShareWarning>,
}

impl ConveyanceOutcome {
    pub fn conveyed(&self) -> Rational {
        self.transfers.iter().map(|(_, amount)| amount).sum()
    }
}

/// Unconveyed remainder of `source`: `share - Σ children.allocated_share`.
pub fn remainder_of(tree: &ShareTree, source: NodeId) -> DomainResult<Rational> {
    tree.unallocated(source)
}

/// Convey portions of `source`'s remainder to `destinations`.
///
/// All checks run before anything is mutated; on error the tree is unchanged.
#[instrument(level = "debug", skip(tree, destinations), fields(destinations = destinations.len()))]
pub fn convey(
    tree: &mut ShareTree,
    source: NodeId,
    destinations: &[Conveyance],
) -> DomainResult<ConveyanceOutcome> {
    let source_name = tree.node(source)?.name().to_string();
    let remainder = remainder_of(tree, source)?;
    if !remainder.is_positive() {
        return Err(DomainError::invalid(format!(
            "'{source_name}' has no remainder to convey"
        )));
    }
    if destinations.is_empty() {
        return Err(DomainError::invalid("no destinations given"));
    }

    let mut total_portion = Rational::zero();
    for conveyance in destinations {
        if conveyance.portion.is_negative() {
            return Err(DomainError::invalid(format!(
                "portion {} is negative",
                conveyance.portion
            )));
        }
        total_portion = &total_portion + &conveyance.portion;
        validate_destination(tree, source, conveyance.destination)?;
    }
    if total_portion > Rational::one() {
        return Err(DomainError::invalid(format!(
            "portions add up to {total_portion}, which exceeds the whole remainder"
        )));
    }

    let transfers: Vec<(NodeId, Rational)> = destinations
        .iter()
        .map(|c| (c.destination, &remainder * &c.portion))
        .collect();
    let conveyed: Rational = transfers.iter().map(|(_, amount)| amount).sum();

    let node = tree.node_mut(source)?;
    node.share = &node.share - &conveyed;

    // ancestors first, so a nested destination's amount is never rescaled again
    let mut order: Vec<&(NodeId, Rational)> = transfers.iter().collect();
    order.sort_by_key(|(destination, _)| level(tree, *destination));

    let mut warnings = Vec::new();
    for (destination, amount) in order {
        let old_share = tree.node(*destination)?.share().clone();
        let new_share = &old_share + amount;
        tree.node_mut(*destination)?.share = new_share.clone();
        if old_share.is_zero() {
            warnings.extend(propagation::indeterminate(tree, *destination)?);
        } else {
            propagation::rescale(tree, *destination, &new_share.divide(&old_share)?)?;
        }
        debug!("conveyed {amount} to {destination}");
    }

    info!("'{source_name}' conveyed {conveyed} of remainder {remainder}");
    Ok(ConveyanceOutcome {
        remainder,
        transfers,
        warnings,
    })
}

/// Number of ancestors above `id`.
fn level(tree: &ShareTree, id: NodeId) -> usize {
    std::iter::successors(tree.get(id).and_then(|n| n.parent()), |p| {
        tree.get(*p).and_then(|n| n.parent())
    })
    .count()
}

fn validate_destination(tree: &ShareTree, source: NodeId, destination: NodeId) -> DomainResult<()> {
    let name = tree.node(destination)?.name();
    if destination == source {
        return Err(DomainError::invalid(format!(
            "'{name}' cannot convey to itself"
        )));
    }
    // rescaling an ancestor would rescale the source's own subtree as well
    if tree.is_ancestor(destination, source)? {
        return Err(DomainError::invalid(format!(
            "'{name}' is an ancestor of the source"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::claimants::total_claimed;

    fn r(text: &str) -> Rational {
        Rational::parse(text).unwrap()
    }

    #[test]
    fn convey_whole_remainder_to_heir() {
        let mut tree = ShareTree::new();
        let a = tree.add_original_owner("A", r("1")).unwrap();
        let b = tree.add_heir(a, "B", &r("1/2")).unwrap();

        let outcome = convey(&mut tree, a, &[Conveyance::new(b, r("1"))]).unwrap();

        assert_eq!(outcome.remainder, r("1/2"));
        assert_eq!(outcome.conveyed(), r("1/2"));
        assert_eq!(tree.node(a).unwrap().share(), &r("1/2"));
        assert_eq!(tree.node(b).unwrap().share(), &r("1"));
        assert_eq!(total_claimed(&tree).unwrap(), r("1"));
    }

    #[test]
    fn convey_splits_between_destinations_and_rescales_their_heirs() {
        let mut tree = ShareTree::new();
        let a = tree.add_original_owner("A", r("1/2")).unwrap();
        let z = tree.add_original_owner("Z", r("1/2")).unwrap();
        let z1 = tree.add_heir(z, "Z1", &r("1")).unwrap();
        let y = tree.add_original_owner("Y", r("0")).unwrap();

        let outcome = convey(
            &mut tree,
            a,
            &[Conveyance::new(z, r("1/2")), Conveyance::new(y, r("1/4"))],
        )
        .unwrap();

        assert!(outcome.warnings.is_empty());
        assert_eq!(tree.node(a).unwrap().share(), &r("1/8"));
        assert_eq!(tree.node(z).unwrap().share(), &r("3/4"));
        assert_eq!(tree.node(z1).unwrap().share(), &r("3/4"));
        assert_eq!(tree.node(z1).unwrap().allocated_share(), &r("3/4"));
        assert_eq!(tree.node(y).unwrap().share(), &r("1/8"));
        assert_eq!(total_claimed(&tree).unwrap(), r("1"));
    }

    #[test]
    fn nested_destinations_conserve_in_any_request_order() {
        let build = || {
            let mut tree = ShareTree::new();
            let a = tree.add_original_owner("A", r("1/2")).unwrap();
            let z = tree.add_original_owner("Z", r("1/2")).unwrap();
            let z1 = tree.add_heir(z, "Z1", &r("1/2")).unwrap();
            (tree, a, z, z1)
        };

        let (mut forward, a, z, z1) = build();
        convey(
            &mut forward,
            a,
            &[Conveyance::new(z, r("1/2")), Conveyance::new(z1, r("1/2"))],
        )
        .unwrap();

        let (mut reverse, a2, z2, z12) = build();
        let outcome = convey(
            &mut reverse,
            a2,
            &[Conveyance::new(z12, r("1/2")), Conveyance::new(z2, r("1/2"))],
        )
        .unwrap();

        assert_eq!(outcome.transfers[0].0, z12);
        assert_eq!(total_claimed(&forward).unwrap(), r("1"));
        assert_eq!(total_claimed(&reverse).unwrap(), r("1"));
        assert_eq!(forward.node(z1).unwrap().share(), reverse.node(z12).unwrap().share());
        assert_eq!(forward.node(z1).unwrap().share(), &r("5/8"));
    }

    #[test]
    fn nothing_to_convey_is_rejected() {
        let mut tree = ShareTree::new();
        let a = tree.add_original_owner("A", r("1")).unwrap();
        let b = tree.add_heir(a, "B", &r("1")).unwrap();
        let err = convey(&mut tree, a, &[Conveyance::new(b, r("1"))]).unwrap_err();
        assert!(matches!(err, DomainError::InvalidOperation(_)));
    }

    #[test]
    fn invalid_portions_leave_tree_untouched() {
        let mut tree = ShareTree::new();
        let a = tree.add_original_owner("A", r("1")).unwrap();
        let b = tree.add_original_owner("B", r("1")).unwrap();
        let c = tree.add_original_owner("C", r("1")).unwrap();

        let too_much = [Conveyance::new(b, r("2/3")), Conveyance::new(c, r("1/2"))];
        assert!(matches!(
            convey(&mut tree, a, &too_much).unwrap_err(),
            DomainError::InvalidOperation(_)
        ));
        let negative = [Conveyance::new(b, r("-1/2"))];
        assert!(matches!(
            convey(&mut tree, a, &negative).unwrap_err(),
            DomainError::InvalidOperation(_)
        ));
        assert_eq!(tree.node(a).unwrap().share(), &r("1"));
        assert_eq!(tree.node(b).unwrap().share(), &r("1"));
    }

    #[test]
    fn self_ancestor_and_missing_destinations_are_rejected() {
        let mut tree = ShareTree::new();
        let a = tree.add_original_owner("A", r("1")).unwrap();
        let b = tree.add_heir(a, "B", &r("1/2")).unwrap();
        let gone = tree.add_original_owner("Gone", r("1")).unwrap();
        tree.delete_node(gone).unwrap();

        assert!(matches!(
            convey(&mut tree, a, &[Conveyance::new(a, r("1"))]).unwrap_err(),
            DomainError::InvalidOperation(_)
        ));
        assert!(matches!(
            convey(&mut tree, b, &[Conveyance::new(a, r("1"))]).unwrap_err(),
            DomainError::InvalidOperation(_)
        ));
        assert!(matches!(
            convey(&mut tree, a, &[Conveyance::new(gone, r("1"))]).unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    #[test]
    fn zero_destination_with_heirs_warns() {
        let mut tree = ShareTree::new();
        let a = tree.add_original_owner("A", r("1")).unwrap();
        let z = tree.add_original_owner("Z", r("1")).unwrap();
        let z1 = tree.add_heir(z, "Z1", &r("1/2")).unwrap();
        tree.node_mut(z).unwrap().share = Rational::zero();

        let outcome = convey(&mut tree, a, &[Conveyance::new(z, r("1/2"))]).unwrap();

        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(tree.node(z).unwrap().share(), &r("1/2"));
        assert_eq!(tree.node(z1).unwrap().share(), &r("1/2"));
    }
}
