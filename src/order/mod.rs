//! Order domain module
//!
//! Contains the vertical vocabulary, order model, status state machine,
//! assignment sync rule, lifecycle service and drift reconciler.

mod model;
mod reconciler;
mod service;
pub mod sync;
pub mod transition;
mod vertical;

pub use model::*;
pub use reconciler::assignment_reconciler;
pub use service::{IssuedOtp, LifecycleError, LifecycleService, ReconcileReport};
pub use transition::{Authority, StatusError};
pub use vertical::*;
