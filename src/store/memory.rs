//! In-memory order store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{OrderStore, StoreError};
use crate::assignment::Assignment;
use crate::order::{AdminOrdersQuery, Order, OrderItem, Product, Vertical};

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    items: HashMap<Uuid, Vec<OrderItem>>,
    assignments: HashMap<Uuid, Assignment>,
    products: HashMap<String, Product>,
}

impl Tables {
    fn hydrate(&self, order: &Order) -> Order {
        let mut order = order.clone();
        order.items = self.items.get(&order.id).cloned().unwrap_or_default();
        order
    }

    fn assignment_for(&self, order_id: Uuid, order_type: Vertical) -> Option<&Assignment> {
        self.assignments
            .values()
            .find(|a| a.order_id == order_id && a.order_type == order_type)
    }

    fn check_assignment_version(&self, assignment: &Assignment) -> Result<(), StoreError> {
        match self.assignments.get(&assignment.id) {
            Some(current) if current.version == assignment.version => Ok(()),
            _ => Err(StoreError::StaleAssignment),
        }
    }
}

/// Store kept entirely in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a catalog entry
    pub async fn add_product(&self, product: Product) {
        let mut tables = self.tables.write().await;
        tables.products.insert(product.id.clone(), product);
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(
        &self,
        order: &Order,
        items: &[OrderItem],
        assignment: &Assignment,
    ) -> Result<(Order, Assignment), StoreError> {
        let mut tables = self.tables.write().await;

        if tables
            .assignment_for(assignment.order_id, assignment.order_type)
            .is_some()
        {
            return Err(StoreError::DuplicateAssignment);
        }

        let mut stored = order.clone();
        stored.items = Vec::new();
        tables.orders.insert(stored.id, stored);
        tables.items.insert(order.id, items.to_vec());
        tables.assignments.insert(assignment.id, assignment.clone());

        let order = tables.hydrate(order);
        Ok((order, assignment.clone()))
    }

    async fn get_order(&self, vertical: Vertical, id: Uuid) -> Result<Option<Order>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .get(&id)
            .filter(|o| o.vertical == vertical)
            .map(|o| tables.hydrate(o)))
    }

    async fn list_user_orders(
        &self,
        vertical: Vertical,
        user_id: Uuid,
    ) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.vertical == vertical && o.user_id == user_id)
            .map(|o| tables.hydrate(o))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_orders(
        &self,
        vertical: Vertical,
        query: &AdminOrdersQuery,
    ) -> Result<(Vec<Order>, i64), StoreError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Order> = tables
            .orders
            .values()
            .filter(|o| o.vertical == vertical && query.matches(o))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .map(|o| tables.hydrate(o))
            .collect();
        Ok((page, total))
    }

    async fn list_orders_updated_since(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.updated_at >= since)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        orders.truncate(limit.max(0) as usize);
        Ok(orders)
    }

    async fn save_order(
        &self,
        order: &Order,
        assignment: Option<&Assignment>,
    ) -> Result<(Order, Option<Assignment>), StoreError> {
        let mut tables = self.tables.write().await;

        match tables.orders.get(&order.id) {
            Some(current) if current.version == order.version => {}
            _ => return Err(StoreError::StaleOrder),
        }
        if let Some(assignment) = assignment {
            tables.check_assignment_version(assignment)?;
        }

        let mut stored = order.clone();
        stored.items = Vec::new();
        stored.version += 1;
        let saved = tables.hydrate(&stored);
        tables.orders.insert(stored.id, stored);

        let saved_assignment = assignment.map(|a| {
            let mut next = a.clone();
            next.version += 1;
            tables.assignments.insert(next.id, next.clone());
            next
        });

        Ok((saved, saved_assignment))
    }

    async fn find_product(&self, id: &str) -> Result<Option<Product>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.products.get(id).cloned())
    }

    async fn insert_assignment(&self, assignment: &Assignment) -> Result<Assignment, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .assignment_for(assignment.order_id, assignment.order_type)
            .is_some()
        {
            return Err(StoreError::DuplicateAssignment);
        }
        tables.assignments.insert(assignment.id, assignment.clone());
        Ok(assignment.clone())
    }

    async fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.assignments.get(&id).cloned())
    }

    async fn find_assignment(
        &self,
        order_id: Uuid,
        order_type: Vertical,
    ) -> Result<Option<Assignment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.assignment_for(order_id, order_type).cloned())
    }

    async fn save_assignment(&self, assignment: &Assignment) -> Result<Assignment, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_assignment_version(assignment)?;

        let mut next = assignment.clone();
        next.version += 1;
        tables.assignments.insert(next.id, next.clone());
        Ok(next)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
