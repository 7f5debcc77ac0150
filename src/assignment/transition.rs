//! Forward-only handoff state machine

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{Assignment, AssignmentStatus};

/// Rejected handoff moves
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Assignment cannot move from {from} to {to}")]
    NotAllowed {
        from: AssignmentStatus,
        to: AssignmentStatus,
    },

    #[error("Assignment is already {0}")]
    Terminal(AssignmentStatus),
}

fn rank(status: AssignmentStatus) -> Option<u8> {
    match status {
        AssignmentStatus::Assigned => Some(0),
        AssignmentStatus::Accepted => Some(1),
        AssignmentStatus::PickedUp => Some(2),
        AssignmentStatus::InTransit => Some(3),
        AssignmentStatus::Delivered => Some(4),
        AssignmentStatus::Completed => Some(5),
        AssignmentStatus::Rejected | AssignmentStatus::Cancelled => None,
    }
}

pub fn is_terminal(status: AssignmentStatus) -> bool {
    matches!(
        status,
        AssignmentStatus::Completed | AssignmentStatus::Cancelled
    )
}

/// Validate `from -> to`. Re-applying the current status is allowed.
pub fn check(from: AssignmentStatus, to: AssignmentStatus) -> Result<(), TransitionError> {
    if from == to {
        return Ok(());
    }
    if is_terminal(from) {
        return Err(TransitionError::Terminal(from));
    }

    let allowed = match (from, to) {
        (_, AssignmentStatus::Cancelled) => true,
        (AssignmentStatus::Assigned | AssignmentStatus::Accepted, AssignmentStatus::Rejected) => {
            true
        }
        // re-offer after a rider declined
        (AssignmentStatus::Rejected, AssignmentStatus::Assigned) => true,
        (AssignmentStatus::Rejected, _) => false,
        (_, AssignmentStatus::Rejected) => false,
        (from, to) => match (rank(from), rank(to)) {
            (Some(a), Some(b)) => b > a,
            _ => false,
        },
    };

    if allowed {
        Ok(())
    } else {
        Err(TransitionError::NotAllowed { from, to })
    }
}

/// Move an assignment to `to`, stamping the transition time once.
///
/// Returns whether anything changed.
pub fn apply(
    assignment: &mut Assignment,
    to: AssignmentStatus,
    now: DateTime<Utc>,
) -> Result<bool, TransitionError> {
    check(assignment.status, to)?;
    if assignment.status == to {
        return Ok(false);
    }

    let stamp = match to {
        AssignmentStatus::Assigned => Some(&mut assignment.assigned_at),
        AssignmentStatus::Accepted => Some(&mut assignment.accepted_at),
        AssignmentStatus::PickedUp => Some(&mut assignment.picked_up_at),
        AssignmentStatus::Delivered => Some(&mut assignment.delivered_at),
        AssignmentStatus::Completed => Some(&mut assignment.completed_at),
        AssignmentStatus::Cancelled => Some(&mut assignment.cancelled_at),
        AssignmentStatus::Rejected | AssignmentStatus::InTransit => None,
    };
    if let Some(field) = stamp {
        field.get_or_insert(now);
    }

    if assignment.status == AssignmentStatus::Rejected && to == AssignmentStatus::Assigned {
        assignment.rider_id = None;
        assignment.rejection_reason = None;
    }

    assignment.status = to;
    assignment.updated_at = now;
    Ok(true)
}
