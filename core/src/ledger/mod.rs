//! Append-only method evolution chain

mod ledger;
mod store;

pub use ledger::{bump_version, MethodLedger, VersionBump};
pub use store::{EvolutionEdge, MethodStore};
