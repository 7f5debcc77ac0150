//! Assignment models and data structures

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::order::{Address, Vertical};

/// Rider handoff record, one per order
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Assignment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_type: Vertical,
    pub rider_id: Option<Uuid>,
    pub status: AssignmentStatus,
    #[sqlx(json)]
    pub pickup_address: Option<Address>,
    #[sqlx(json)]
    pub dropoff_address: Option<Address>,
    pub vehicle_type: Option<String>,
    pub fare: i64,
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<i32>,
    pub earnings: i64,
    pub rejection_reason: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Handoff status, independent of the order's own status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "assignment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    Accepted,
    Rejected,
    PickedUp,
    InTransit,
    Delivered,
    Completed,
    Cancelled,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::Accepted => "accepted",
            AssignmentStatus::Rejected => "rejected",
            AssignmentStatus::PickedUp => "picked_up",
            AssignmentStatus::InTransit => "in_transit",
            AssignmentStatus::Delivered => "delivered",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to open an assignment for an order
#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub order_id: Uuid,
    pub order_type: Vertical,
    pub pickup_address: Option<Address>,
    pub dropoff_address: Option<Address>,
    pub fare: i64,
    pub vehicle_type: Option<String>,
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<i32>,
}

impl Assignment {
    /// Unassigned record in the `assigned` state
    pub fn open(new: NewAssignment, earnings_percent: u32, now: DateTime<Utc>) -> Self {
        let earnings = new.fare * i64::from(earnings_percent) / 100;

        Self {
            id: Uuid::new_v4(),
            order_id: new.order_id,
            order_type: new.order_type,
            rider_id: None,
            status: AssignmentStatus::Assigned,
            pickup_address: new.pickup_address,
            dropoff_address: new.dropoff_address,
            vehicle_type: new.vehicle_type,
            fare: new.fare,
            distance_km: new.distance_km,
            duration_minutes: new.duration_minutes,
            earnings,
            rejection_reason: None,
            assigned_at: Some(now),
            accepted_at: None,
            picked_up_at: None,
            delivered_at: None,
            completed_at: None,
            cancelled_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request body for a rider or admin status change
#[derive(Debug, Deserialize)]
pub struct UpdateAssignmentStatusRequest {
    pub status: AssignmentStatus,
}

/// Request body for a rider declining an offer
#[derive(Debug, Deserialize, Default)]
pub struct RejectAssignmentRequest {
    pub reason: Option<String>,
}
