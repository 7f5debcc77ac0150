//! Assignment domain module
//!
//! Contains the handoff model, its state machine and the ledger service.

mod ledger;
mod model;
pub mod transition;

pub use ledger::{AssignmentLedger, LedgerError};
pub use model::*;
pub use transition::TransitionError;
