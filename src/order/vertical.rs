//! Verticals and their status vocabularies
//!
//! Each vertical speaks its own status words; all of them map onto one
//! canonical lifecycle so the state machine is written once.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Business line an order belongs to
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "order_vertical", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Vertical {
    Grocery,
    Ecommerce,
    Taxi,
    Porter,
}

/// Every status word used by any vertical
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Accepted,
    OutForDelivery,
    Shipped,
    InProgress,
    PickedUp,
    Delivered,
    Completed,
    Cancelled,
}

/// Canonical position in the order lifecycle
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    Pending,
    Confirmed,
    Processing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl LifecycleStage {
    /// Position along the forward path; `None` for the cancellation branch
    pub fn rank(&self) -> Option<u8> {
        match self {
            LifecycleStage::Pending => Some(0),
            LifecycleStage::Confirmed => Some(1),
            LifecycleStage::Processing => Some(2),
            LifecycleStage::OutForDelivery => Some(3),
            LifecycleStage::Delivered => Some(4),
            LifecycleStage::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleStage::Delivered | LifecycleStage::Cancelled)
    }
}

pub const ALL_VERTICALS: [Vertical; 4] = [
    Vertical::Grocery,
    Vertical::Ecommerce,
    Vertical::Taxi,
    Vertical::Porter,
];

impl Vertical {
    /// Tag used for `order_type` and URL prefixes
    pub fn as_str(&self) -> &'static str {
        match self {
            Vertical::Grocery => "grocery",
            Vertical::Ecommerce => "ecommerce",
            Vertical::Taxi => "taxi",
            Vertical::Porter => "porter",
        }
    }

    pub fn order_number_prefix(&self) -> &'static str {
        match self {
            Vertical::Grocery => "GRO",
            Vertical::Ecommerce => "ECO",
            Vertical::Taxi => "TAX",
            Vertical::Porter => "POR",
        }
    }

    /// Ride and parcel verticals can be booked by fare alone
    pub fn allows_fare_only(&self) -> bool {
        matches!(self, Vertical::Taxi | Vertical::Porter)
    }

    /// Vocabulary table: the stage of `status` in this vertical, if it belongs
    pub fn stage_of(&self, status: OrderStatus) -> Option<LifecycleStage> {
        use LifecycleStage as S;
        use OrderStatus as O;

        let stage = match (self, status) {
            (_, O::Pending) => S::Pending,
            (_, O::Confirmed) => S::Confirmed,
            (_, O::Cancelled) => S::Cancelled,

            (Vertical::Grocery, O::Processing) => S::Processing,
            (Vertical::Grocery, O::OutForDelivery) => S::OutForDelivery,
            (Vertical::Grocery, O::Delivered) => S::Delivered,

            (Vertical::Ecommerce, O::Processing) => S::Processing,
            (Vertical::Ecommerce, O::Shipped) => S::OutForDelivery,
            (Vertical::Ecommerce, O::Delivered) => S::Delivered,

            (Vertical::Taxi, O::Accepted) => S::Processing,
            (Vertical::Taxi, O::InProgress) => S::OutForDelivery,
            (Vertical::Taxi, O::Completed) => S::Delivered,

            (Vertical::Porter, O::Accepted) => S::Processing,
            (Vertical::Porter, O::PickedUp) => S::OutForDelivery,
            (Vertical::Porter, O::Delivered) => S::Delivered,

            _ => return None,
        };
        Some(stage)
    }

    /// The status word this vertical uses for a stage
    pub fn status_for(&self, stage: LifecycleStage) -> OrderStatus {
        use LifecycleStage as S;
        use OrderStatus as O;

        match (self, stage) {
            (_, S::Pending) => O::Pending,
            (_, S::Confirmed) => O::Confirmed,
            (_, S::Cancelled) => O::Cancelled,
            (Vertical::Grocery | Vertical::Ecommerce, S::Processing) => O::Processing,
            (Vertical::Taxi | Vertical::Porter, S::Processing) => O::Accepted,
            (Vertical::Grocery, S::OutForDelivery) => O::OutForDelivery,
            (Vertical::Ecommerce, S::OutForDelivery) => O::Shipped,
            (Vertical::Taxi, S::OutForDelivery) => O::InProgress,
            (Vertical::Porter, S::OutForDelivery) => O::PickedUp,
            (Vertical::Taxi, S::Delivered) => O::Completed,
            (_, S::Delivered) => O::Delivered,
        }
    }

    /// Statuses after which the customer can no longer cancel
    pub fn blocks_cancellation(&self, status: OrderStatus) -> bool {
        match self.stage_of(status) {
            Some(stage) if stage.is_terminal() => true,
            _ => status == OrderStatus::Shipped,
        }
    }
}

impl fmt::Display for Vertical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vertical {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grocery" => Ok(Vertical::Grocery),
            "ecommerce" => Ok(Vertical::Ecommerce),
            "taxi" => Ok(Vertical::Taxi),
            "porter" => Ok(Vertical::Porter),
            other => Err(format!("Unknown order type: '{}'", other)),
        }
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Accepted => "accepted",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Shipped => "shipped",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
