//! PostgreSQL order store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::{OrderStore, StoreError};
use crate::assignment::Assignment;
use crate::order::{AdminOrdersQuery, Order, OrderItem, Product, Vertical};

const ASSIGNMENT_UNIQUE: &str = "uq_order_assignment";

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Load line items for a batch of orders
    async fn attach_items(&self, mut orders: Vec<Order>) -> Result<Vec<Order>, StoreError> {
        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, id",
        )
        .bind(&ids)
        .fetch_all(&self.db_pool)
        .await?;

        let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }
        for order in &mut orders {
            order.items = by_order.remove(&order.id).unwrap_or_default();
        }

        Ok(orders)
    }

    async fn update_assignment_in(
        tx: &mut Transaction<'_, Postgres>,
        assignment: &Assignment,
    ) -> Result<Assignment, StoreError> {
        sqlx::query_as::<_, Assignment>(
            r#"
            UPDATE order_assignments
            SET rider_id = $1, status = $2, rejection_reason = $3,
                assigned_at = $4, accepted_at = $5, picked_up_at = $6,
                delivered_at = $7, completed_at = $8, cancelled_at = $9,
                updated_at = $10, version = version + 1
            WHERE id = $11 AND version = $12
            RETURNING *
            "#,
        )
        .bind(assignment.rider_id)
        .bind(assignment.status)
        .bind(&assignment.rejection_reason)
        .bind(assignment.assigned_at)
        .bind(assignment.accepted_at)
        .bind(assignment.picked_up_at)
        .bind(assignment.delivered_at)
        .bind(assignment.completed_at)
        .bind(assignment.cancelled_at)
        .bind(assignment.updated_at)
        .bind(assignment.id)
        .bind(assignment.version)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(StoreError::StaleAssignment)
    }

    async fn insert_assignment_in(
        tx: &mut Transaction<'_, Postgres>,
        assignment: &Assignment,
    ) -> Result<Assignment, StoreError> {
        sqlx::query_as::<_, Assignment>(
            r#"
            INSERT INTO order_assignments (
                id, order_id, order_type, rider_id, status, pickup_address,
                dropoff_address, vehicle_type, fare, distance_km, duration_minutes,
                earnings, rejection_reason, assigned_at, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(assignment.id)
        .bind(assignment.order_id)
        .bind(assignment.order_type)
        .bind(assignment.rider_id)
        .bind(assignment.status)
        .bind(Json(&assignment.pickup_address))
        .bind(Json(&assignment.dropoff_address))
        .bind(&assignment.vehicle_type)
        .bind(assignment.fare)
        .bind(assignment.distance_km)
        .bind(assignment.duration_minutes)
        .bind(assignment.earnings)
        .bind(&assignment.rejection_reason)
        .bind(assignment.assigned_at)
        .bind(assignment.version)
        .bind(assignment.created_at)
        .bind(assignment.updated_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_unique_violation)
    }
}

fn map_unique_violation(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.constraint() == Some(ASSIGNMENT_UNIQUE) => {
            StoreError::DuplicateAssignment
        }
        _ => StoreError::Database(err),
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, vertical: Vertical, query: &AdminOrdersQuery) {
    builder.push(" WHERE vertical = ");
    builder.push_bind(vertical);

    if let Some(status) = query.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
    if let Some(payment_status) = query.payment_status {
        builder.push(" AND payment_status = ");
        builder.push_bind(payment_status);
    }
    if let Some(payment_method) = query.payment_method {
        builder.push(" AND payment_method = ");
        builder.push_bind(payment_method);
    }
    if let Some(from) = query.from_ts() {
        builder.push(" AND created_at >= ");
        builder.push_bind(from);
    }
    if let Some(to) = query.to_ts() {
        builder.push(" AND created_at < ");
        builder.push_bind(to);
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_order(
        &self,
        order: &Order,
        items: &[OrderItem],
        assignment: &Assignment,
    ) -> Result<(Order, Assignment), StoreError> {
        let mut tx = self.db_pool.begin().await?;

        let mut saved = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                id, order_number, vertical, user_id, status, subtotal, delivery_fee,
                total_amount, payment_method, payment_status, payment_details,
                delivery_address, pickup_address, dropoff_address, notes, vehicle_type,
                distance_km, duration_minutes, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21)
            RETURNING *
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.vertical)
        .bind(order.user_id)
        .bind(order.status)
        .bind(order.subtotal)
        .bind(order.delivery_fee)
        .bind(order.total_amount)
        .bind(order.payment_method)
        .bind(order.payment_status)
        .bind(Json(&order.payment_details))
        .bind(Json(&order.delivery_address))
        .bind(Json(&order.pickup_address))
        .bind(Json(&order.dropoff_address))
        .bind(&order.notes)
        .bind(&order.vehicle_type)
        .bind(order.distance_km)
        .bind(order.duration_minutes)
        .bind(order.version)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        for item in items {
            let item = sqlx::query_as::<_, OrderItem>(
                r#"
                INSERT INTO order_items (id, order_id, item_ref, name, quantity, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(item.id)
            .bind(saved.id)
            .bind(&item.item_ref)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.line_total)
            .fetch_one(&mut *tx)
            .await?;
            saved.items.push(item);
        }

        let assignment = Self::insert_assignment_in(&mut tx, assignment).await?;

        tx.commit().await?;

        Ok((saved, assignment))
    }

    async fn get_order(&self, vertical: Vertical, id: Uuid) -> Result<Option<Order>, StoreError> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE id = $1 AND vertical = $2",
        )
        .bind(id)
        .bind(vertical)
        .fetch_optional(&self.db_pool)
        .await?;

        match order {
            Some(order) => Ok(self.attach_items(vec![order]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_user_orders(
        &self,
        vertical: Vertical,
        user_id: Uuid,
    ) -> Result<Vec<Order>, StoreError> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE vertical = $1 AND user_id = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(vertical)
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        self.attach_items(orders).await
    }

    async fn list_orders(
        &self,
        vertical: Vertical,
        query: &AdminOrdersQuery,
    ) -> Result<(Vec<Order>, i64), StoreError> {
        let mut count_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM orders");
        push_filters(&mut count_builder, vertical, query);
        let (total,) = count_builder
            .build_query_as::<(i64,)>()
            .fetch_one(&self.db_pool)
            .await?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM orders");
        push_filters(&mut builder, vertical, query);
        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(query.limit());
        builder.push(" OFFSET ");
        builder.push_bind(query.offset());

        let orders = builder
            .build_query_as::<Order>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok((self.attach_items(orders).await?, total))
    }

    async fn list_orders_updated_since(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE updated_at >= $1
            ORDER BY updated_at ASC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(orders)
    }

    async fn save_order(
        &self,
        order: &Order,
        assignment: Option<&Assignment>,
    ) -> Result<(Order, Option<Assignment>), StoreError> {
        let mut tx = self.db_pool.begin().await?;

        let saved = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = $1, payment_status = $2, payment_details = $3,
                cancellation_reason = $4, cancelled_by = $5, rating = $6,
                review = $7, rated_at = $8, updated_at = $9, version = version + 1
            WHERE id = $10 AND version = $11
            RETURNING *
            "#,
        )
        .bind(order.status)
        .bind(order.payment_status)
        .bind(Json(&order.payment_details))
        .bind(&order.cancellation_reason)
        .bind(order.cancelled_by)
        .bind(order.rating)
        .bind(&order.review)
        .bind(order.rated_at)
        .bind(order.updated_at)
        .bind(order.id)
        .bind(order.version)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::StaleOrder)?;

        let saved_assignment = match assignment {
            Some(assignment) => Some(Self::update_assignment_in(&mut tx, assignment).await?),
            None => None,
        };

        tx.commit().await?;

        let mut saved = saved;
        saved.items = order.items.clone();
        Ok((saved, saved_assignment))
    }

    async fn find_product(&self, id: &str) -> Result<Option<Product>, StoreError> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(product)
    }

    async fn insert_assignment(&self, assignment: &Assignment) -> Result<Assignment, StoreError> {
        let mut tx = self.db_pool.begin().await?;
        let saved = Self::insert_assignment_in(&mut tx, assignment).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>, StoreError> {
        let assignment =
            sqlx::query_as::<_, Assignment>("SELECT * FROM order_assignments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?;

        Ok(assignment)
    }

    async fn find_assignment(
        &self,
        order_id: Uuid,
        order_type: Vertical,
    ) -> Result<Option<Assignment>, StoreError> {
        let assignment = sqlx::query_as::<_, Assignment>(
            "SELECT * FROM order_assignments WHERE order_id = $1 AND order_type = $2",
        )
        .bind(order_id)
        .bind(order_type)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(assignment)
    }

    async fn save_assignment(&self, assignment: &Assignment) -> Result<Assignment, StoreError> {
        let mut tx = self.db_pool.begin().await?;
        let saved = Self::update_assignment_in(&mut tx, assignment).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.db_pool).await?;
        Ok(())
    }
}
