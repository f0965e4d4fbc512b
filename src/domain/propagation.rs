//! Proportional re-propagation of shares down a subtree.
//!
//! Every descendant's new value depends only on its own prior value and the
//! factor, so visiting order does not matter.

use std::fmt;

use tracing::{debug, instrument, warn};

use crate::domain::arena::{NodeId, ShareTree};
use crate::domain::error::DomainResult;
use crate::domain::rational::Rational;

/// Non-fatal condition attached to a committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareWarning {
    /// The node's prior share was zero, so its descendants could not be
    /// rescaled and likely need manual correction.
    PropagationIndeterminate {
        node: NodeId,
        name: String,
        descendants: usize,
    },
}

impl fmt::Display for ShareWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareWarning::PropagationIndeterminate {
                name, descendants, ..
            } => write!(
                f,
                "the previous share of '{name}' was 0: {descendants} descendant share(s) \
                 could not be updated automatically and are likely incorrect, edit them manually"
            ),
        }
    }
}

/// Multiply `share` and `allocated_share` of every descendant of `node` by `factor`.
///
/// A zero factor is handled as [`collapse`]. Returns the number of nodes touched.
#[instrument(level = "debug", skip(tree, factor), fields(factor = %factor))]
pub fn rescale(tree: &mut ShareTree, node: NodeId, factor: &Rational) -> DomainResult<usize> {
    if factor.is_zero() {
        return collapse(tree, node);
    }
    let descendants = tree.descendants(node)?;
    for id in &descendants {
        let child = tree.node_mut(*id)?;
        child.share = &child.share * factor;
        child.allocated_share = &child.allocated_share * factor;
    }
    debug!("rescaled {} descendant(s)", descendants.len());
    Ok(descendants.len())
}

/// Force every descendant of `node` to an exact zero share.
#[instrument(level = "debug", skip(tree))]
pub fn collapse(tree: &mut ShareTree, node: NodeId) -> DomainResult<usize> {
    let descendants = tree.descendants(node)?;
    for id in &descendants {
        let child = tree.node_mut(*id)?;
        child.share = Rational::zero();
        child.allocated_share = Rational::zero();
    }
    debug!("collapsed {} descendant(s) to zero", descendants.len());
    Ok(descendants.len())
}

/// Warning for a node that went from zero to non-zero while having descendants.
pub(crate) fn indeterminate(tree: &ShareTree, node: NodeId) -> DomainResult<Option<ShareWarning>> {
    let descendants = tree.descendants(node)?.len();
    if descendants == 0 {
        return Ok(None);
    }
    let warning = ShareWarning::PropagationIndeterminate {
        node,
        name: tree.node(node)?.name().to_string(),
        descendants,
    };
    warn!("{warning}");
    Ok(Some(warning))
}
