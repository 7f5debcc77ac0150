//! Order models and data structures

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use super::{OrderStatus, Vertical};
use crate::otp::{OtpKind, OtpRecord, OtpSummary};

/// Order model, shared by every vertical
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub vertical: Vertical,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    #[sqlx(json)]
    pub payment_details: PaymentDetails,
    #[sqlx(json)]
    pub delivery_address: Option<Address>,
    #[sqlx(json)]
    pub pickup_address: Option<Address>,
    #[sqlx(json)]
    pub dropoff_address: Option<Address>,
    pub notes: Option<String>,
    pub vehicle_type: Option<String>,
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<i32>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub rating: Option<i16>,
    pub review: Option<String>,
    pub rated_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// Line item belonging to an order
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub item_ref: String,
    pub name: Option<String>,
    pub quantity: i32,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[serde(alias = "cod")]
    CashOnDelivery,
    Card,
    Wallet,
    Upi,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Embedded payment sub-document holding the order's codes
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct PaymentDetails {
    #[serde(default)]
    pub delivery_otp: Option<OtpRecord>,
    #[serde(default)]
    pub cod_otp: Option<OtpRecord>,
}

impl PaymentDetails {
    pub fn otp(&self, kind: OtpKind) -> Option<&OtpRecord> {
        match kind {
            OtpKind::Delivery => self.delivery_otp.as_ref(),
            OtpKind::Cod => self.cod_otp.as_ref(),
        }
    }

    pub fn otp_mut(&mut self, kind: OtpKind) -> &mut Option<OtpRecord> {
        match kind {
            OtpKind::Delivery => &mut self.delivery_otp,
            OtpKind::Cod => &mut self.cod_otp,
        }
    }
}

/// Denormalised address kept for display
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Validate)]
pub struct Address {
    #[validate(length(min = 1, max = 300, message = "Address line is required"))]
    pub address: String,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude out of range"))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude out of range"))]
    pub longitude: Option<f64>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
}

/// Catalog entry used to price ecommerce items
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub sale_price: Option<i64>,
}

impl Product {
    /// Sale price wins when the product is on sale
    pub fn effective_price(&self) -> i64 {
        self.sale_price.filter(|p| *p > 0).unwrap_or(self.price)
    }
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Line item as submitted by a client
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct OrderItemInput {
    #[serde(alias = "grocery_id", alias = "product_id", alias = "item_id")]
    #[validate(length(min = 1, message = "Item reference is required"))]
    pub item_ref: String,
    pub name: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: Option<i64>,
}

/// Request DTO for placing an order
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderItemInput>,
    #[serde(alias = "shipping_address")]
    pub delivery_address: Option<Address>,
    pub pickup_address: Option<Address>,
    pub dropoff_address: Option<Address>,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub vehicle_type: Option<String>,
    #[validate(range(min = 1, message = "Fare must be positive"))]
    pub fare: Option<i64>,
    #[validate(range(min = 0.0))]
    pub distance_km: Option<f64>,
    #[validate(range(min = 0))]
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelOrderRequest {
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RateOrderRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,
    #[validate(length(max = 2000))]
    pub review: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ResendOtpRequest {
    #[serde(default)]
    pub kind: OtpKind,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub kind: OtpKind,
    pub code: String,
}

/// Query parameters for the admin listing
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AdminOrdersQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl AdminOrdersQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    /// Inclusive start of the date window
    pub fn from_ts(&self) -> Option<DateTime<Utc>> {
        self.from
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    /// Exclusive end of the date window (the day after `to`)
    pub fn to_ts(&self) -> Option<DateTime<Utc>> {
        self.to
            .and_then(|d| d.succ_opt())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status == s)
            && self.payment_status.map_or(true, |s| order.payment_status == s)
            && self.payment_method.map_or(true, |m| order.payment_method == m)
            && self.from_ts().map_or(true, |ts| order.created_at >= ts)
            && self.to_ts().map_or(true, |ts| order.created_at < ts)
    }
}

/// How much of the order's codes a response may reveal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpExposure {
    /// List endpoints: no codes at all
    Hidden,
    /// Single-order reads: the live delivery code as `otp_number`
    Detail,
    /// Creation response: every issued code in plaintext
    Created,
}

/// Order as returned over the API
#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: OrderSummary,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<OtpSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_otp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cod_otp: Option<String>,
}

/// Order fields that are always safe to show
#[derive(Debug, Serialize)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub order_type: Vertical,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub delivery_address: Option<Address>,
    pub pickup_address: Option<Address>,
    pub dropoff_address: Option<Address>,
    pub notes: Option<String>,
    pub vehicle_type: Option<String>,
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<i32>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub rating: Option<i16>,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderView {
    pub fn new(order: Order, exposure: OtpExposure) -> Self {
        let details = &order.payment_details;
        let otp = details.delivery_otp.as_ref().map(OtpRecord::summary);

        let (otp_number, delivery_otp, cod_otp) = match exposure {
            OtpExposure::Hidden => (None, None, None),
            OtpExposure::Detail => (
                details
                    .delivery_otp
                    .as_ref()
                    .filter(|r| r.consumed_at.is_none())
                    .map(|r| r.code.clone()),
                None,
                None,
            ),
            OtpExposure::Created => (
                None,
                details.delivery_otp.as_ref().map(|r| r.code.clone()),
                details.cod_otp.as_ref().map(|r| r.code.clone()),
            ),
        };

        Self {
            order: OrderSummary {
                id: order.id,
                order_number: order.order_number,
                order_type: order.vertical,
                user_id: order.user_id,
                status: order.status,
                subtotal: order.subtotal,
                delivery_fee: order.delivery_fee,
                total_amount: order.total_amount,
                payment_method: order.payment_method,
                payment_status: order.payment_status,
                delivery_address: order.delivery_address,
                pickup_address: order.pickup_address,
                dropoff_address: order.dropoff_address,
                notes: order.notes,
                vehicle_type: order.vehicle_type,
                distance_km: order.distance_km,
                duration_minutes: order.duration_minutes,
                cancellation_reason: order.cancellation_reason,
                cancelled_by: order.cancelled_by,
                rating: order.rating,
                review: order.review,
                created_at: order.created_at,
                updated_at: order.updated_at,
            },
            items: order.items,
            otp,
            otp_number,
            delivery_otp,
            cod_otp,
        }
    }
}
