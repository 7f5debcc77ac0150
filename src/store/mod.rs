//! Persistence for orders, line items and assignments
//!
//! The lifecycle service only talks to [`OrderStore`]. PostgreSQL backs it in
//! deployments; the in-memory store serves local development and tests.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::assignment::Assignment;
use crate::order::{AdminOrdersQuery, Order, OrderItem, Product, Vertical};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Order was modified concurrently")]
    StaleOrder,

    #[error("Assignment was modified concurrently")]
    StaleAssignment,

    #[error("An assignment already exists for this order")]
    DuplicateAssignment,
}

/// Order persistence boundary
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Write an order, its items and its assignment as one unit
    async fn create_order(
        &self,
        order: &Order,
        items: &[OrderItem],
        assignment: &Assignment,
    ) -> Result<(Order, Assignment), StoreError>;

    async fn get_order(&self, vertical: Vertical, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// A customer's orders, newest first
    async fn list_user_orders(
        &self,
        vertical: Vertical,
        user_id: Uuid,
    ) -> Result<Vec<Order>, StoreError>;

    /// Filtered page plus total count
    async fn list_orders(
        &self,
        vertical: Vertical,
        query: &AdminOrdersQuery,
    ) -> Result<(Vec<Order>, i64), StoreError>;

    /// Orders touched at or after `since`, oldest first
    async fn list_orders_updated_since(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Order>, StoreError>;

    /// Persist a modified order, and its mirrored assignment in the same
    /// transaction when given. Both are checked against their `version`.
    async fn save_order(
        &self,
        order: &Order,
        assignment: Option<&Assignment>,
    ) -> Result<(Order, Option<Assignment>), StoreError>;

    async fn find_product(&self, id: &str) -> Result<Option<Product>, StoreError>;

    async fn insert_assignment(&self, assignment: &Assignment) -> Result<Assignment, StoreError>;

    async fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>, StoreError>;

    async fn find_assignment(
        &self,
        order_id: Uuid,
        order_type: Vertical,
    ) -> Result<Option<Assignment>, StoreError>;

    async fn save_assignment(&self, assignment: &Assignment) -> Result<Assignment, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
