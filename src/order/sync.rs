//! Mirroring an order's status onto its rider assignment

use chrono::{DateTime, Utc};

use super::{LifecycleStage, Order};
use crate::assignment::{transition, Assignment, AssignmentStatus};

/// Handoff status an order stage implies, if any
pub fn project(stage: LifecycleStage) -> Option<AssignmentStatus> {
    match stage {
        LifecycleStage::Pending => None,
        LifecycleStage::Confirmed => Some(AssignmentStatus::Assigned),
        LifecycleStage::Processing => Some(AssignmentStatus::Accepted),
        LifecycleStage::OutForDelivery => Some(AssignmentStatus::PickedUp),
        LifecycleStage::Delivered => Some(AssignmentStatus::Delivered),
        LifecycleStage::Cancelled => Some(AssignmentStatus::Cancelled),
    }
}

/// What to do with the assignment after an order change
#[derive(Debug, Clone, PartialEq)]
pub enum SyncPlan {
    /// Write this updated assignment alongside the order
    Write(Assignment),
    /// Already in the mirrored state, or nothing to mirror
    Unchanged,
    /// Mirroring is not possible; the order is written alone
    Skip(String),
}

/// Work out the mirrored assignment for `order`
pub fn plan(order: &Order, assignment: Option<&Assignment>, now: DateTime<Utc>) -> SyncPlan {
    let Some(stage) = order.vertical.stage_of(order.status) else {
        return SyncPlan::Skip(format!("status {} has no lifecycle stage", order.status));
    };
    let Some(target) = project(stage) else {
        return SyncPlan::Unchanged;
    };
    let Some(current) = assignment else {
        return SyncPlan::Skip("no assignment for order".to_string());
    };

    let mut next = current.clone();
    match transition::apply(&mut next, target, now) {
        Ok(true) => SyncPlan::Write(next),
        Ok(false) => SyncPlan::Unchanged,
        Err(e) => SyncPlan::Skip(e.to_string()),
    }
}
