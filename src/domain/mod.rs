//! Domain layer: the share allocation engine
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod claimants;
pub mod conveyance;
pub mod error;
pub mod propagation;
pub mod rational;
pub mod snapshot;

pub use arena::{NodeId, ShareNode, ShareTree, TreeIterator};
pub use claimants::{
    over_allocations, resolve, total_claimed, Balance, ClaimKind, Claimant, OverAllocation,
    TotalShares,
};
pub use conveyance::{convey, remainder_of, Conveyance, ConveyanceOutcome};
pub use error::{DomainError, DomainResult};
pub use propagation::{collapse, rescale, ShareWarning};
pub use rational::Rational;
pub use snapshot::{History, NodeRecord, Snapshot};
