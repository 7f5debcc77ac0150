//! Order status state machine, written once over lifecycle stages

use thiserror::Error;

use super::{LifecycleStage, OrderStatus, Vertical};

/// Who is asking for the move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// Forward-only
    Standard,
    /// May also step back between non-terminal stages
    AdminOverride,
}

/// Rejected order status moves
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("Status '{status}' is not valid for {vertical} orders")]
    UnknownStatus { vertical: Vertical, status: OrderStatus },

    #[error("Order is already cancelled")]
    AlreadyCancelled,

    #[error("Order cannot be cancelled once shipped or delivered")]
    AlreadyShippedOrDelivered,

    #[error("Order is already {0} and can no longer change")]
    Terminal(OrderStatus),

    #[error("Order cannot move back from {from} to {to}")]
    Backward { from: OrderStatus, to: OrderStatus },
}

/// Resolve a status word to its stage for this vertical
pub fn stage(vertical: Vertical, status: OrderStatus) -> Result<LifecycleStage, StatusError> {
    vertical
        .stage_of(status)
        .ok_or(StatusError::UnknownStatus { vertical, status })
}

/// Validate `from -> to` for an order of `vertical`.
///
/// Re-applying the current non-terminal status is accepted as a no-op.
pub fn check(
    vertical: Vertical,
    from: OrderStatus,
    to: OrderStatus,
    authority: Authority,
) -> Result<(), StatusError> {
    let from_stage = stage(vertical, from)?;
    let to_stage = stage(vertical, to)?;

    if to_stage == LifecycleStage::Cancelled {
        if from_stage == LifecycleStage::Cancelled {
            return Err(StatusError::AlreadyCancelled);
        }
        if vertical.blocks_cancellation(from) {
            return Err(StatusError::AlreadyShippedOrDelivered);
        }
        return Ok(());
    }

    if from_stage.is_terminal() {
        return Err(StatusError::Terminal(from));
    }

    match (from_stage.rank(), to_stage.rank()) {
        (Some(a), Some(b)) if b >= a => Ok(()),
        (Some(_), Some(_)) if authority == Authority::AdminOverride => Ok(()),
        _ => Err(StatusError::Backward { from, to }),
    }
}
