//! Assignment ledger service - rider handoff bookkeeping

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::transition::{self, TransitionError};
use super::{Assignment, AssignmentStatus, NewAssignment};
use crate::auth::Principal;
use crate::models::UserRole;
use crate::order::Vertical;
use crate::store::{OrderStore, StoreError};

/// Ledger failures
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Assignment not found")]
    NotFound,

    #[error("Assignment belongs to another rider")]
    NotYourAssignment,

    #[error("You do not have access to this assignment")]
    Forbidden,

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Service owning the cross-vertical assignment records
#[derive(Clone)]
pub struct AssignmentLedger {
    store: Arc<dyn OrderStore>,
    earnings_percent: u32,
}

impl AssignmentLedger {
    pub fn new(store: Arc<dyn OrderStore>, earnings_percent: u32) -> Self {
        Self {
            store,
            earnings_percent,
        }
    }

    /// Build, but do not persist, a fresh assignment
    pub fn prepare(&self, new: NewAssignment) -> Assignment {
        Assignment::open(new, self.earnings_percent, Utc::now())
    }

    /// Open an assignment for an order; an existing one is returned as-is
    pub async fn create(&self, new: NewAssignment) -> Result<Assignment, LedgerError> {
        if let Some(existing) = self.find_by_order(new.order_id, new.order_type).await? {
            return Ok(existing);
        }

        let (order_id, order_type) = (new.order_id, new.order_type);
        let assignment = self.prepare(new);
        match self.store.insert_assignment(&assignment).await {
            Ok(saved) => {
                tracing::info!(
                    assignment_id = %saved.id,
                    order_id = %order_id,
                    order_type = %order_type,
                    "Assignment created"
                );
                Ok(saved)
            }
            // Lost a race with a concurrent create
            Err(StoreError::DuplicateAssignment) => self
                .find_by_order(order_id, order_type)
                .await?
                .ok_or(LedgerError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Assignment, LedgerError> {
        self.store
            .get_assignment(id)
            .await?
            .ok_or(LedgerError::NotFound)
    }

    pub async fn find_by_order(
        &self,
        order_id: Uuid,
        order_type: Vertical,
    ) -> Result<Option<Assignment>, LedgerError> {
        Ok(self.store.find_assignment(order_id, order_type).await?)
    }

    /// Move an assignment along the handoff state machine
    pub async fn set_status(
        &self,
        id: Uuid,
        status: AssignmentStatus,
    ) -> Result<Assignment, LedgerError> {
        let mut assignment = self.get(id).await?;
        if !transition::apply(&mut assignment, status, Utc::now())? {
            return Ok(assignment);
        }

        let saved = self.store.save_assignment(&assignment).await?;
        tracing::info!(assignment_id = %id, status = %status, "Assignment status updated");
        Ok(saved)
    }

    /// Status change requested by a rider; only the attached rider may move it
    pub async fn rider_set_status(
        &self,
        id: Uuid,
        rider_id: Uuid,
        status: AssignmentStatus,
    ) -> Result<Assignment, LedgerError> {
        let assignment = self.get(id).await?;
        if assignment.rider_id != Some(rider_id) {
            return Err(LedgerError::NotYourAssignment);
        }
        self.set_status(id, status).await
    }

    /// Riders see open assignments and their own, admins their vertical's,
    /// customers the one attached to their order
    pub async fn authorize_view(
        &self,
        assignment: &Assignment,
        principal: &Principal,
    ) -> Result<(), LedgerError> {
        let allowed = match principal.role {
            UserRole::Rider => assignment.rider_id.map_or(true, |r| r == principal.id),
            _ if principal.administers(assignment.order_type) => true,
            UserRole::Customer => self
                .store
                .get_order(assignment.order_type, assignment.order_id)
                .await?
                .is_some_and(|o| o.user_id == principal.id),
            _ => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(LedgerError::Forbidden)
        }
    }

    /// Status change on behalf of `principal`: the attached rider, or an admin
    /// of the assignment's vertical
    pub async fn set_status_as(
        &self,
        id: Uuid,
        principal: &Principal,
        status: AssignmentStatus,
    ) -> Result<Assignment, LedgerError> {
        let assignment = self.get(id).await?;
        if principal.administers(assignment.order_type) {
            return self.set_status(id, status).await;
        }
        if principal.role != UserRole::Rider {
            return Err(LedgerError::Forbidden);
        }
        self.rider_set_status(id, principal.id, status).await
    }

    /// A rider takes an open assignment.
    ///
    /// The order may already have pushed the handoff past `assigned`; the
    /// rider then attaches at the current status.
    pub async fn accept(&self, id: Uuid, rider_id: Uuid) -> Result<Assignment, LedgerError> {
        let mut assignment = self.get(id).await?;
        match assignment.rider_id {
            Some(current) if current != rider_id => return Err(LedgerError::NotYourAssignment),
            Some(_) => return Ok(assignment),
            None => {}
        }

        let now = Utc::now();
        match assignment.status {
            AssignmentStatus::Assigned => {
                transition::apply(&mut assignment, AssignmentStatus::Accepted, now)?;
            }
            status if transition::is_terminal(status) => {
                return Err(TransitionError::Terminal(status).into());
            }
            AssignmentStatus::Rejected => {
                return Err(TransitionError::NotAllowed {
                    from: AssignmentStatus::Rejected,
                    to: AssignmentStatus::Accepted,
                }
                .into());
            }
            _ => {
                assignment.accepted_at.get_or_insert(now);
                assignment.updated_at = now;
            }
        }
        assignment.rider_id = Some(rider_id);

        let saved = self.store.save_assignment(&assignment).await?;
        tracing::info!(assignment_id = %id, rider_id = %rider_id, "Assignment accepted");
        Ok(saved)
    }

    /// A rider declines; the assignment goes straight back on offer
    pub async fn reject(
        &self,
        id: Uuid,
        rider_id: Uuid,
        reason: Option<String>,
    ) -> Result<Assignment, LedgerError> {
        let mut assignment = self.get(id).await?;
        if matches!(assignment.rider_id, Some(current) if current != rider_id) {
            return Err(LedgerError::NotYourAssignment);
        }

        let now = Utc::now();
        transition::apply(&mut assignment, AssignmentStatus::Rejected, now)?;
        tracing::info!(
            assignment_id = %id,
            rider_id = %rider_id,
            reason = ?reason,
            "Assignment rejected, re-offering"
        );
        transition::apply(&mut assignment, AssignmentStatus::Assigned, now)?;
        assignment.rejection_reason = reason;

        Ok(self.store.save_assignment(&assignment).await?)
    }
}
