//! Ledger session service
//!
//! The command surface used by front-ends: text arguments are parsed here,
//! every mutation is recorded on the undo stack, and the forest is loaded from
//! and saved to a ledger document through the filesystem boundary.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::application::document::LedgerDocument;
use crate::application::{ApplicationResult, IoResultExt};
use crate::domain::{
    self, Claimant, Conveyance, ConveyanceOutcome, DomainResult, History, NodeId, OverAllocation,
    Rational, ShareTree, ShareWarning, Snapshot, TotalShares,
};
use crate::infrastructure::traits::FileSystem;

/// One editing session over a share forest.
pub struct LedgerService {
    fs: Arc<dyn FileSystem>,
    tree: ShareTree,
    history: History,
}

impl LedgerService {
    /// Start an empty session.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            tree: ShareTree::new(),
            history: History::new(),
        }
    }

    /// Open the ledger at `path`; a missing file is an empty ledger.
    ///
    /// With `keep_history` the persisted undo stack is restored as well.
    #[instrument(level = "debug", skip(fs))]
    pub fn open(fs: Arc<dyn FileSystem>, path: &Path, keep_history: bool) -> ApplicationResult<Self> {
        let mut service = Self::new(fs);
        if service.fs.exists(path) {
            service.load(path, keep_history)?;
        } else {
            debug!("no ledger at {}, starting empty", path.display());
        }
        Ok(service)
    }

    pub fn tree(&self) -> &ShareTree {
        &self.tree
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    // --------------------------------------------------------
    // Commands
    // --------------------------------------------------------

    pub fn add_original_owner(&mut self, name: &str, share_text: &str) -> ApplicationResult<NodeId> {
        let share = Rational::parse(share_text)?;
        self.mutate(|tree| tree.add_original_owner(name, share))
    }

    pub fn add_heir(
        &mut self,
        parent: NodeId,
        name: &str,
        relative_share_text: &str,
    ) -> ApplicationResult<NodeId> {
        let fraction = Rational::parse(relative_share_text)?;
        self.mutate(|tree| tree.add_heir(parent, name, &fraction))
    }

    pub fn edit_node(
        &mut self,
        node: NodeId,
        name: &str,
        relative_share_text: &str,
    ) -> ApplicationResult<Vec<ShareWarning>> {
        let relative = Rational::parse(relative_share_text)?;
        self.mutate(|tree| tree.edit_node(node, name, &relative))
    }

    pub fn delete_node(&mut self, node: NodeId) -> ApplicationResult<usize> {
        self.mutate(|tree| tree.delete_node(node))
    }

    /// Convey portions (fractions of the remainder, as text) to destinations.
    pub fn convey(
        &mut self,
        source: NodeId,
        destinations: &[(NodeId, &str)],
    ) -> ApplicationResult<ConveyanceOutcome> {
        let conveyances = destinations
            .iter()
            .map(|(dest, portion)| -> DomainResult<Conveyance> {
                Ok(Conveyance::new(*dest, Rational::parse(portion)?))
            })
            .collect::<DomainResult<Vec<_>>>()?;
        self.mutate(|tree| domain::convey(tree, source, &conveyances))
    }

    pub fn rebalance_original_owners(&mut self) -> ApplicationResult<Vec<ShareWarning>> {
        self.mutate(ShareTree::rebalance_original_owners)
    }

    pub fn clear(&mut self) -> ApplicationResult<()> {
        self.mutate(|tree| {
            tree.clear();
            Ok(())
        })
    }

    /// Restore the state before the most recent mutation.
    ///
    /// Returns `false` when there is nothing to undo. Node ids issued before
    /// the undo are invalid afterwards.
    #[instrument(level = "debug", skip(self))]
    pub fn undo(&mut self) -> ApplicationResult<bool> {
        let Some(snapshot) = self.history.pop() else {
            info!("nothing to undo");
            return Ok(false);
        };
        match snapshot.restore() {
            Ok(tree) => {
                self.tree = tree;
                Ok(true)
            }
            Err(e) => {
                self.history.push(snapshot);
                Err(e.into())
            }
        }
    }

    // --------------------------------------------------------
    // Queries
    // --------------------------------------------------------

    pub fn report(&self) -> ApplicationResult<Vec<Claimant>> {
        Ok(domain::resolve(&self.tree)?)
    }

    pub fn total_shares(&self) -> ApplicationResult<TotalShares> {
        Ok(TotalShares::of(&self.tree)?)
    }

    pub fn over_allocations(&self) -> ApplicationResult<Vec<OverAllocation>> {
        Ok(domain::over_allocations(&self.tree)?)
    }

    pub fn remainder_of(&self, node: NodeId) -> ApplicationResult<Rational> {
        Ok(domain::remainder_of(&self.tree, node)?)
    }

    pub fn suggested_owner_share(&self) -> Rational {
        self.tree.suggested_owner_share()
    }

    /// Resolve an outline address such as `"1.2"`.
    pub fn locate(&self, address: &str) -> ApplicationResult<NodeId> {
        Ok(self.tree.find_by_outline(address)?)
    }

    // --------------------------------------------------------
    // Persistence
    // --------------------------------------------------------

    /// Replace the session with the ledger stored at `path`.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&mut self, path: &Path, keep_history: bool) -> ApplicationResult<()> {
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read ledger", path)?;
        let document = LedgerDocument::from_json(&content)?;
        let tree = document.nodes.restore()?;
        self.tree = tree;
        self.history = if keep_history {
            document.history
        } else {
            History::new()
        };
        info!(
            "loaded {} node(s), {} undo step(s) from {}",
            self.tree.len(),
            self.history.len(),
            path.display()
        );
        Ok(())
    }

    /// Write the session to `path` (pre-order node records).
    #[instrument(level = "debug", skip(self))]
    pub fn save(&self, path: &Path, keep_history: bool) -> ApplicationResult<()> {
        let history = if keep_history {
            self.history.clone()
        } else {
            History::new()
        };
        let document = LedgerDocument::new(Snapshot::capture(&self.tree)?, history);
        self.fs
            .write_atomic(path, &document.to_json()?)
            .with_path_context("write ledger", path)?;
        info!("saved {} node(s) to {}", self.tree.len(), path.display());
        Ok(())
    }

    /// Run `op` on a working copy; commit it and record the prior state only on success.
    fn mutate<T>(
        &mut self,
        op: impl FnOnce(&mut ShareTree) -> DomainResult<T>,
    ) -> ApplicationResult<T> {
        let before = Snapshot::capture(&self.tree)?;
        let mut working = self.tree.clone();
        let value = op(&mut working)?;
        self.tree = working;
        self.history.push(before);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ApplicationError;
    use crate::domain::DomainError;
    use crate::infrastructure::traits::RealFileSystem;

    fn service() -> LedgerService {
        LedgerService::new(Arc::new(RealFileSystem))
    }

    #[test]
    fn malformed_text_fails_without_history_entry() {
        let mut ledger = service();
        let err = ledger.add_original_owner("A", "3/0").unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::Parse { .. })
        ));
        assert!(ledger.tree().is_empty());
        assert!(ledger.history().is_empty());
    }

    #[test]
    fn failed_mutation_leaves_state_and_history_untouched() {
        let mut ledger = service();
        let a = ledger.add_original_owner("A", "1").unwrap();
        let b = ledger.add_heir(a, "B", "1").unwrap();
        let err = ledger.convey(a, &[(b, "1")]).unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::InvalidOperation(_))
        ));
        assert_eq!(ledger.history().len(), 2);
        assert_eq!(ledger.tree().len(), 2);
    }

    #[test]
    fn bad_portion_text_is_a_parse_error() {
        let mut ledger = service();
        let a = ledger.add_original_owner("A", "1").unwrap();
        let z = ledger.add_original_owner("Z", "1").unwrap();
        let err = ledger.convey(a, &[(z, "half")]).unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::Parse { .. })
        ));
    }

    #[test]
    fn undo_walks_back_each_mutation() {
        let mut ledger = service();
        let a = ledger.add_original_owner("A", "1").unwrap();
        ledger.add_heir(a, "B", "1/2").unwrap();
        ledger.clear().unwrap();
        assert!(ledger.tree().is_empty());

        assert!(ledger.undo().unwrap());
        assert_eq!(ledger.tree().len(), 2);
        assert!(ledger.undo().unwrap());
        assert_eq!(ledger.tree().len(), 1);
        assert!(ledger.undo().unwrap());
        assert!(ledger.tree().is_empty());
        assert!(!ledger.undo().unwrap());
    }

    #[test]
    fn locate_uses_outline_addresses() {
        let mut ledger = service();
        let a = ledger.add_original_owner("A", "1").unwrap();
        let b = ledger.add_heir(a, "B", "1/2").unwrap();
        assert_eq!(ledger.locate("1.1").unwrap(), b);
        assert!(matches!(
            ledger.locate("3").unwrap_err(),
            ApplicationError::Domain(DomainError::NotFound(_))
        ));
    }
}
