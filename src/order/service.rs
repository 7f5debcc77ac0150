//! Order lifecycle service
//!
//! One implementation serves every vertical. Vertical differences live in the
//! vocabulary table in [`super::vertical`]; everything here works on stages.

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use super::sync::{self, SyncPlan};
use super::transition::{self, Authority, StatusError};
use super::{
    AdminOrdersQuery, CreateOrderRequest, LifecycleStage, Order, OrderItem, OrderItemInput,
    OrderStatus, PaymentDetails, PaymentMethod, PaymentStatus, RateOrderRequest, Vertical,
};
use crate::assignment::{AssignmentLedger, NewAssignment};
use crate::auth::Principal;
use crate::config::OtpPolicies;
use crate::otp::{self, OtpError, OtpKind, OtpRecord};
use crate::store::{OrderStore, StoreError};

/// Lifecycle failures
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(String),

    #[error("Order not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("Only delivered orders can be rated")]
    NotDelivered,

    #[error("Order has already been rated")]
    AlreadyRated,

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error("Order was modified by another request, please retry")]
    Conflict,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StaleOrder | StoreError::StaleAssignment => LifecycleError::Conflict,
            other => LifecycleError::Store(other),
        }
    }
}

impl From<ValidationErrors> for LifecycleError {
    fn from(err: ValidationErrors) -> Self {
        LifecycleError::Validation(err.to_string())
    }
}

/// A freshly issued or re-issued code, returned to the customer
#[derive(Debug, Clone, serde::Serialize)]
pub struct IssuedOtp {
    pub kind: OtpKind,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub attempts_left: i32,
    pub resend_count: i32,
}

impl IssuedOtp {
    fn new(kind: OtpKind, record: &OtpRecord) -> Self {
        Self {
            kind,
            code: record.code.clone(),
            expires_at: record.expires_at,
            attempts_left: record.attempts_left,
            resend_count: record.resend_count,
        }
    }
}

/// Outcome of a reconciliation sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub repaired: usize,
    pub skipped: usize,
    /// `updated_at` of the newest order scanned
    pub last_updated_at: Option<DateTime<Utc>>,
}

/// Order lifecycle service
#[derive(Clone)]
pub struct LifecycleService {
    store: Arc<dyn OrderStore>,
    ledger: AssignmentLedger,
    otp_policies: OtpPolicies,
    delivery_fee: i64,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        ledger: AssignmentLedger,
        otp_policies: OtpPolicies,
        delivery_fee: i64,
    ) -> Self {
        Self {
            store,
            ledger,
            otp_policies,
            delivery_fee,
        }
    }

    /// Place an order: items, codes and assignment are written as one unit
    pub async fn create_order(
        &self,
        vertical: Vertical,
        principal: &Principal,
        req: CreateOrderRequest,
    ) -> Result<Order, LifecycleError> {
        req.validate()?;
        for item in &req.items {
            item.validate()?;
        }
        for address in [&req.delivery_address, &req.pickup_address, &req.dropoff_address]
            .into_iter()
            .flatten()
        {
            address.validate()?;
        }

        if vertical.allows_fare_only() {
            if req.pickup_address.is_none() || req.dropoff_address.is_none() {
                return Err(LifecycleError::Validation(
                    "Pickup and dropoff addresses are required".to_string(),
                ));
            }
        } else if req.delivery_address.is_none() {
            return Err(LifecycleError::Validation(
                "Delivery address is required".to_string(),
            ));
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let items = self.price_items(vertical, order_id, &req.items).await?;

        let subtotal = if items.is_empty() {
            if !vertical.allows_fare_only() {
                return Err(LifecycleError::Validation(
                    "Order must contain at least one item".to_string(),
                ));
            }
            req.fare.ok_or_else(|| {
                LifecycleError::Validation("Fare is required when no items are given".to_string())
            })?
        } else {
            items
                .iter()
                .try_fold(0i64, |acc, item| acc.checked_add(item.line_total))
                .ok_or_else(too_large)?
        };

        let delivery_fee = if vertical.allows_fare_only() {
            0
        } else {
            self.delivery_fee
        };
        let total_amount = subtotal.checked_add(delivery_fee).ok_or_else(too_large)?;

        let payment_details = PaymentDetails {
            delivery_otp: Some(otp::issue(
                &self.otp_policies.policy(vertical, OtpKind::Delivery),
                now,
            )),
            cod_otp: (req.payment_method == PaymentMethod::CashOnDelivery)
                .then(|| otp::issue(&self.otp_policies.policy(vertical, OtpKind::Cod), now)),
        };

        let order = Order {
            id: order_id,
            order_number: order_number(vertical, now),
            vertical,
            user_id: principal.id,
            status: OrderStatus::Pending,
            subtotal,
            delivery_fee,
            total_amount,
            payment_method: req.payment_method,
            payment_status: PaymentStatus::Pending,
            payment_details,
            delivery_address: req.delivery_address.clone(),
            pickup_address: req.pickup_address.clone(),
            dropoff_address: req.dropoff_address.clone(),
            notes: req.notes,
            vehicle_type: req.vehicle_type.clone(),
            distance_km: req.distance_km,
            duration_minutes: req.duration_minutes,
            cancellation_reason: None,
            cancelled_by: None,
            rating: None,
            review: None,
            rated_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        };

        // Ride fares go to the rider's share in full; deliveries pay out of the fee
        let fare = if vertical.allows_fare_only() {
            total_amount
        } else {
            delivery_fee
        };
        let assignment = self.ledger.prepare(NewAssignment {
            order_id,
            order_type: vertical,
            pickup_address: req.pickup_address,
            dropoff_address: req.dropoff_address.or(req.delivery_address),
            fare,
            vehicle_type: req.vehicle_type,
            distance_km: req.distance_km,
            duration_minutes: req.duration_minutes,
        });

        let (saved, assignment) = self.store.create_order(&order, &items, &assignment).await?;

        info!(
            order_id = %saved.id,
            order_number = %saved.order_number,
            vertical = %vertical,
            user_id = %principal.id,
            total_amount = saved.total_amount,
            assignment_id = %assignment.id,
            "Order created"
        );

        Ok(saved)
    }

    /// Single order; hidden from anyone but its owner and the vertical's admins
    pub async fn get_order(
        &self,
        vertical: Vertical,
        principal: &Principal,
        id: Uuid,
    ) -> Result<Order, LifecycleError> {
        let order = self.load(vertical, id).await?;
        if order.user_id != principal.id && !principal.administers(vertical) {
            return Err(LifecycleError::NotFound);
        }
        Ok(order)
    }

    pub async fn list_my_orders(
        &self,
        vertical: Vertical,
        principal: &Principal,
    ) -> Result<Vec<Order>, LifecycleError> {
        Ok(self
            .store
            .list_user_orders(vertical, principal.id)
            .await?)
    }

    pub async fn admin_list_orders(
        &self,
        vertical: Vertical,
        principal: &Principal,
        query: &AdminOrdersQuery,
    ) -> Result<(Vec<Order>, i64), LifecycleError> {
        require_admin(vertical, principal)?;
        Ok(self.store.list_orders(vertical, query).await?)
    }

    /// Owner or admin moves the order forward
    pub async fn update_status(
        &self,
        vertical: Vertical,
        principal: &Principal,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, LifecycleError> {
        let order = self.load_owned(vertical, principal, id).await?;
        self.transition(order, principal, status, Authority::Standard, None)
            .await
    }

    /// Admin override: may also step back between open stages
    pub async fn admin_update_status(
        &self,
        vertical: Vertical,
        principal: &Principal,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, LifecycleError> {
        require_admin(vertical, principal)?;
        let order = self.load(vertical, id).await?;
        self.transition(order, principal, status, Authority::AdminOverride, None)
            .await
    }

    pub async fn cancel(
        &self,
        vertical: Vertical,
        principal: &Principal,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<Order, LifecycleError> {
        let order = self.load_owned(vertical, principal, id).await?;
        let cancelled = vertical.status_for(LifecycleStage::Cancelled);
        self.transition(order, principal, cancelled, Authority::Standard, reason)
            .await
    }

    /// Customer feedback; once, and only after delivery
    pub async fn rate(
        &self,
        vertical: Vertical,
        principal: &Principal,
        id: Uuid,
        req: RateOrderRequest,
    ) -> Result<Order, LifecycleError> {
        req.validate()?;
        let mut order = self.load(vertical, id).await?;
        if order.user_id != principal.id {
            return Err(LifecycleError::Forbidden(
                "Only the customer can rate this order".to_string(),
            ));
        }
        if vertical.stage_of(order.status) != Some(LifecycleStage::Delivered) {
            return Err(LifecycleError::NotDelivered);
        }
        if order.rating.is_some() {
            return Err(LifecycleError::AlreadyRated);
        }

        let now = Utc::now();
        order.rating = Some(req.rating);
        order.review = req.review;
        order.rated_at = Some(now);
        order.updated_at = now;

        let (saved, _) = self.store.save_order(&order, None).await?;
        info!(order_id = %id, rating = req.rating, "Order rated");
        Ok(saved)
    }

    /// Re-issue a code, replacing the live one
    pub async fn resend_otp(
        &self,
        vertical: Vertical,
        principal: &Principal,
        id: Uuid,
        kind: OtpKind,
    ) -> Result<IssuedOtp, LifecycleError> {
        let mut order = self.load_owned(vertical, principal, id).await?;
        let stage = transition::stage(vertical, order.status)?;
        if stage.is_terminal() {
            return Err(StatusError::Terminal(order.status).into());
        }

        let now = Utc::now();
        let policy = self.otp_policies.policy(vertical, kind);
        let current = order.payment_details.otp(kind).ok_or(OtpError::NotIssued)?;
        let record = otp::resend(current, &policy, now)?;
        let issued = IssuedOtp::new(kind, &record);

        *order.payment_details.otp_mut(kind) = Some(record);
        order.updated_at = now;
        self.store.save_order(&order, None).await?;

        info!(
            order_id = %id,
            kind = ?kind,
            resend_count = issued.resend_count,
            "OTP re-issued"
        );
        Ok(issued)
    }

    /// Check a code presented at handoff.
    ///
    /// The attached rider or a vertical admin submits it. A delivery code
    /// closes the order as delivered, a COD code marks it paid.
    pub async fn verify_otp(
        &self,
        vertical: Vertical,
        principal: &Principal,
        id: Uuid,
        kind: OtpKind,
        code: &str,
    ) -> Result<Order, LifecycleError> {
        let mut order = self.load(vertical, id).await?;
        if !principal.administers(vertical) {
            let assignment = self.store.find_assignment(id, vertical).await?;
            if assignment.and_then(|a| a.rider_id) != Some(principal.id) {
                return Err(LifecycleError::Forbidden(
                    "Only the assigned rider can verify this code".to_string(),
                ));
            }
        }

        let stage = transition::stage(vertical, order.status)?;
        if stage.is_terminal() {
            return Err(StatusError::Terminal(order.status).into());
        }

        let now = Utc::now();
        let record = order
            .payment_details
            .otp_mut(kind)
            .as_mut()
            .ok_or(OtpError::NotIssued)?;
        let before = record.attempts_left;

        if let Err(e) = otp::verify(record, code, now) {
            if record.attempts_left != before {
                order.updated_at = now;
                self.store.save_order(&order, None).await?;
            }
            warn!(order_id = %id, kind = ?kind, error = %e, "OTP verification failed");
            return Err(e.into());
        }

        info!(order_id = %id, kind = ?kind, "OTP verified");
        match kind {
            OtpKind::Delivery => {
                let delivered = vertical.status_for(LifecycleStage::Delivered);
                self.transition(order, principal, delivered, Authority::Standard, None)
                    .await
            }
            OtpKind::Cod => {
                order.payment_status = PaymentStatus::Paid;
                order.updated_at = now;
                let (saved, _) = self.store.save_order(&order, None).await?;
                Ok(saved)
            }
        }
    }

    /// Walk recently touched orders and repair assignment drift
    pub async fn reconcile_since(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<ReconcileReport, LifecycleError> {
        let orders = self.store.list_orders_updated_since(since, limit).await?;
        let mut report = ReconcileReport {
            scanned: orders.len(),
            last_updated_at: orders.last().map(|o| o.updated_at),
            ..Default::default()
        };

        for order in orders {
            let assignment = self.store.find_assignment(order.id, order.vertical).await?;
            match sync::plan(&order, assignment.as_ref(), Utc::now()) {
                SyncPlan::Write(next) => match self.store.save_assignment(&next).await {
                    Ok(saved) => {
                        report.repaired += 1;
                        info!(
                            order_id = %order.id,
                            assignment_id = %saved.id,
                            status = %saved.status,
                            "Repaired assignment drift"
                        );
                    }
                    Err(e) => {
                        report.skipped += 1;
                        warn!(order_id = %order.id, error = %e, "Assignment repair failed");
                    }
                },
                SyncPlan::Unchanged => {}
                SyncPlan::Skip(reason) => {
                    report.skipped += 1;
                    tracing::debug!(order_id = %order.id, reason = %reason, "Drift not repairable");
                }
            }
        }

        Ok(report)
    }

    async fn load(&self, vertical: Vertical, id: Uuid) -> Result<Order, LifecycleError> {
        self.store
            .get_order(vertical, id)
            .await?
            .ok_or(LifecycleError::NotFound)
    }

    async fn load_owned(
        &self,
        vertical: Vertical,
        principal: &Principal,
        id: Uuid,
    ) -> Result<Order, LifecycleError> {
        let order = self.load(vertical, id).await?;
        if order.user_id != principal.id && !principal.administers(vertical) {
            return Err(LifecycleError::Forbidden(
                "You do not have access to this order".to_string(),
            ));
        }
        Ok(order)
    }

    async fn transition(
        &self,
        mut order: Order,
        principal: &Principal,
        to: OrderStatus,
        authority: Authority,
        reason: Option<String>,
    ) -> Result<Order, LifecycleError> {
        let from = order.status;
        transition::check(order.vertical, from, to, authority)?;

        let now = Utc::now();
        if from != to {
            order.status = to;
            order.updated_at = now;
            if order.vertical.stage_of(to) == Some(LifecycleStage::Cancelled) {
                order.cancellation_reason = reason;
                order.cancelled_by = Some(principal.id);
            }
        }

        let saved = self.commit(order, now).await?;
        info!(
            order_id = %saved.id,
            vertical = %saved.vertical,
            from = %from,
            to = %to,
            actor = %principal.id,
            "Order status updated"
        );
        Ok(saved)
    }

    /// Write the order with its mirrored assignment. Mirroring never fails
    /// the order write.
    async fn commit(&self, order: Order, now: DateTime<Utc>) -> Result<Order, LifecycleError> {
        let assignment = match self.store.find_assignment(order.id, order.vertical).await {
            Ok(a) => a,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Assignment lookup failed, skipping sync");
                None
            }
        };

        let mirrored = match sync::plan(&order, assignment.as_ref(), now) {
            SyncPlan::Write(next) => Some(next),
            SyncPlan::Unchanged => None,
            SyncPlan::Skip(reason) => {
                warn!(order_id = %order.id, reason = %reason, "Assignment sync skipped");
                None
            }
        };

        match self.store.save_order(&order, mirrored.as_ref()).await {
            Ok((saved, synced)) => {
                if let Some(a) = synced {
                    info!(
                        order_id = %saved.id,
                        assignment_id = %a.id,
                        status = %a.status,
                        "Assignment synced"
                    );
                }
                Ok(saved)
            }
            Err(StoreError::StaleAssignment) => {
                warn!(order_id = %order.id, "Assignment changed concurrently, saving order alone");
                let (saved, _) = self.store.save_order(&order, None).await?;
                Ok(saved)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve unit prices: the catalog for ecommerce, the request elsewhere
    async fn price_items(
        &self,
        vertical: Vertical,
        order_id: Uuid,
        inputs: &[OrderItemInput],
    ) -> Result<Vec<OrderItem>, LifecycleError> {
        let mut items = Vec::with_capacity(inputs.len());

        for input in inputs {
            let (name, unit_price) = if vertical == Vertical::Ecommerce {
                let product = self
                    .store
                    .find_product(&input.item_ref)
                    .await?
                    .ok_or_else(|| {
                        LifecycleError::Validation(format!("Product {} not found", input.item_ref))
                    })?;
                let price = product.effective_price();
                (product.name, price)
            } else {
                let price = input.price.ok_or_else(|| {
                    LifecycleError::Validation(format!("Price is required for {}", input.item_ref))
                })?;
                (input.name.clone().unwrap_or_else(|| input.item_ref.clone()), price)
            };

            let line_total = unit_price
                .checked_mul(i64::from(input.quantity))
                .ok_or_else(too_large)?;

            items.push(OrderItem {
                id: Uuid::new_v4(),
                order_id,
                item_ref: input.item_ref.clone(),
                name: Some(name),
                quantity: input.quantity,
                unit_price,
                line_total,
            });
        }

        Ok(items)
    }
}

fn require_admin(vertical: Vertical, principal: &Principal) -> Result<(), LifecycleError> {
    if principal.administers(vertical) {
        Ok(())
    } else {
        Err(LifecycleError::Forbidden(format!(
            "{vertical} admin access required"
        )))
    }
}

fn too_large() -> LifecycleError {
    LifecycleError::Validation("Order total is too large".to_string())
}

/// `{PREFIX}-{yyyymmdd}-{6 random alphanumerics}`
fn order_number(vertical: Vertical, now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!(
        "{}-{}-{}",
        vertical.order_number_prefix(),
        now.format("%Y%m%d"),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::AssignmentStatus;
    use crate::models::UserRole;
    use crate::order::{Address, Product};
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: LifecycleService,
        ledger: AssignmentLedger,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ledger = AssignmentLedger::new(store.clone(), 80);
        let service = LifecycleService::new(
            store.clone(),
            ledger.clone(),
            OtpPolicies::default(),
            0,
        );
        Fixture {
            store,
            service,
            ledger,
        }
    }

    fn customer() -> Principal {
        Principal::new(Uuid::new_v4(), UserRole::Customer)
    }

    fn address(line: &str) -> Address {
        Address {
            address: line.to_string(),
            city: Some("Pune".to_string()),
            postal_code: None,
            latitude: None,
            longitude: None,
            contact_name: None,
            contact_phone: None,
        }
    }

    fn item(item_ref: &str, quantity: i32, price: Option<i64>) -> OrderItemInput {
        OrderItemInput {
            item_ref: item_ref.to_string(),
            name: None,
            quantity,
            price,
        }
    }

    fn grocery_request(payment_method: PaymentMethod) -> CreateOrderRequest {
        CreateOrderRequest {
            items: vec![item("G1", 2, Some(100))],
            delivery_address: Some(address("12 Market Road")),
            pickup_address: None,
            dropoff_address: None,
            payment_method,
            notes: None,
            vehicle_type: None,
            fare: None,
            distance_km: None,
            duration_minutes: None,
        }
    }

    fn ride_request(fare: Option<i64>) -> CreateOrderRequest {
        CreateOrderRequest {
            items: Vec::new(),
            delivery_address: None,
            pickup_address: Some(address("Station")),
            dropoff_address: Some(address("Airport")),
            payment_method: PaymentMethod::Wallet,
            notes: None,
            vehicle_type: Some("sedan".to_string()),
            fare,
            distance_km: Some(12.5),
            duration_minutes: Some(30),
        }
    }

    #[tokio::test]
    async fn test_create_grocery_order() {
        let f = fixture();
        let user = customer();

        let order = f
            .service
            .create_order(Vertical::Grocery, &user, grocery_request(PaymentMethod::Card))
            .await
            .unwrap();

        assert_eq!(order.total_amount, 200);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 1);
        assert!(order.order_number.starts_with("GRO-"));
        let delivery = order.payment_details.delivery_otp.as_ref().unwrap();
        assert_eq!(delivery.code.len(), 6);
        assert!(order.payment_details.cod_otp.is_none());

        let assignment = f
            .ledger
            .find_by_order(order.id, Vertical::Grocery)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Assigned);
        assert_eq!(assignment.rider_id, None);
    }

    #[tokio::test]
    async fn test_cod_order_gets_second_code() {
        let f = fixture();
        let order = f
            .service
            .create_order(
                Vertical::Grocery,
                &customer(),
                grocery_request(PaymentMethod::CashOnDelivery),
            )
            .await
            .unwrap();

        assert_eq!(order.payment_details.cod_otp.as_ref().unwrap().code.len(), 4);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_items() {
        let f = fixture();
        let mut req = grocery_request(PaymentMethod::Card);
        req.items.clear();

        let result = f
            .service
            .create_order(Vertical::Grocery, &customer(), req)
            .await;
        assert!(matches!(result, Err(LifecycleError::Validation(_))));
    }

    #[tokio::test]
    async fn test_fare_only_ride() {
        let f = fixture();
        let order = f
            .service
            .create_order(Vertical::Taxi, &customer(), ride_request(Some(450)))
            .await
            .unwrap();
        assert_eq!(order.total_amount, 450);

        let assignment = f
            .ledger
            .find_by_order(order.id, Vertical::Taxi)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment.fare, 450);
        assert_eq!(assignment.earnings, 360);

        let missing_fare = f
            .service
            .create_order(Vertical::Taxi, &customer(), ride_request(None))
            .await;
        assert!(matches!(missing_fare, Err(LifecycleError::Validation(_))));
    }

    #[tokio::test]
    async fn test_ecommerce_prices_from_catalog() {
        let f = fixture();
        f.store
            .add_product(Product {
                id: "P1".to_string(),
                name: "Headphones".to_string(),
                price: 1000,
                sale_price: Some(800),
            })
            .await;

        let mut req = grocery_request(PaymentMethod::Card);
        req.items = vec![item("P1", 3, Some(1))];
        let order = f
            .service
            .create_order(Vertical::Ecommerce, &customer(), req)
            .await
            .unwrap();
        assert_eq!(order.total_amount, 2400);
        assert_eq!(order.items[0].name.as_deref(), Some("Headphones"));

        let mut unknown = grocery_request(PaymentMethod::Card);
        unknown.items = vec![item("P404", 1, None)];
        let result = f
            .service
            .create_order(Vertical::Ecommerce, &customer(), unknown)
            .await;
        assert!(matches!(result, Err(LifecycleError::Validation(_))));
    }

    #[tokio::test]
    async fn test_status_update_syncs_assignment() {
        let f = fixture();
        let user = customer();
        let order = f
            .service
            .create_order(Vertical::Grocery, &user, grocery_request(PaymentMethod::Card))
            .await
            .unwrap();

        let updated = f
            .service
            .update_status(Vertical::Grocery, &user, order.id, OrderStatus::OutForDelivery)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::OutForDelivery);
        assert_eq!(updated.version, order.version + 1);

        let assignment = f
            .ledger
            .find_by_order(order.id, Vertical::Grocery)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment.status, AssignmentStatus::PickedUp);
        assert!(assignment.picked_up_at.is_some());

        // Repeat is a no-op that keeps the timestamp
        f.service
            .update_status(Vertical::Grocery, &user, order.id, OrderStatus::OutForDelivery)
            .await
            .unwrap();
        let again = f.ledger.get(assignment.id).await.unwrap();
        assert_eq!(again.picked_up_at, assignment.picked_up_at);
    }

    #[tokio::test]
    async fn test_status_update_rules() {
        let f = fixture();
        let user = customer();
        let order = f
            .service
            .create_order(Vertical::Grocery, &user, grocery_request(PaymentMethod::Card))
            .await
            .unwrap();

        let stranger = customer();
        let denied = f
            .service
            .update_status(Vertical::Grocery, &stranger, order.id, OrderStatus::Confirmed)
            .await;
        assert!(matches!(denied, Err(LifecycleError::Forbidden(_))));

        let foreign = f
            .service
            .update_status(Vertical::Grocery, &user, order.id, OrderStatus::Shipped)
            .await;
        assert!(matches!(
            foreign,
            Err(LifecycleError::Status(StatusError::UnknownStatus { .. }))
        ));

        f.service
            .update_status(Vertical::Grocery, &user, order.id, OrderStatus::Processing)
            .await
            .unwrap();
        let backward = f
            .service
            .update_status(Vertical::Grocery, &user, order.id, OrderStatus::Confirmed)
            .await;
        assert!(matches!(
            backward,
            Err(LifecycleError::Status(StatusError::Backward { .. }))
        ));

        let admin = Principal::new(Uuid::new_v4(), UserRole::GroceryAdmin);
        let overridden = f
            .service
            .admin_update_status(Vertical::Grocery, &admin, order.id, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(overridden.status, OrderStatus::Confirmed);

        let wrong_admin = Principal::new(Uuid::new_v4(), UserRole::TaxiAdmin);
        let denied = f
            .service
            .admin_update_status(Vertical::Grocery, &wrong_admin, order.id, OrderStatus::Pending)
            .await;
        assert!(matches!(denied, Err(LifecycleError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_cancel_guards() {
        let f = fixture();
        let user = customer();
        let order = f
            .service
            .create_order(Vertical::Grocery, &user, grocery_request(PaymentMethod::Card))
            .await
            .unwrap();

        let cancelled = f
            .service
            .cancel(Vertical::Grocery, &user, order.id, Some("changed mind".to_string()))
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.cancelled_by, Some(user.id));
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("changed mind"));

        let again = f
            .service
            .cancel(Vertical::Grocery, &user, order.id, None)
            .await
            .unwrap_err();
        assert_eq!(again.to_string(), "Order is already cancelled");

        let assignment = f
            .ledger
            .find_by_order(order.id, Vertical::Grocery)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_rate_requires_delivery() {
        let f = fixture();
        let user = customer();
        let order = f
            .service
            .create_order(Vertical::Grocery, &user, grocery_request(PaymentMethod::Card))
            .await
            .unwrap();
        let rating = || RateOrderRequest {
            rating: 5,
            review: Some("quick".to_string()),
        };

        let early = f
            .service
            .rate(Vertical::Grocery, &user, order.id, rating())
            .await;
        assert!(matches!(early, Err(LifecycleError::NotDelivered)));

        f.service
            .update_status(Vertical::Grocery, &user, order.id, OrderStatus::Delivered)
            .await
            .unwrap();
        let rated = f
            .service
            .rate(Vertical::Grocery, &user, order.id, rating())
            .await
            .unwrap();
        assert_eq!(rated.rating, Some(5));
        assert!(rated.rated_at.is_some());

        let twice = f
            .service
            .rate(Vertical::Grocery, &user, order.id, rating())
            .await;
        assert!(matches!(twice, Err(LifecycleError::AlreadyRated)));
    }

    #[tokio::test]
    async fn test_resend_cap() {
        let f = fixture();
        let user = customer();
        let order = f
            .service
            .create_order(Vertical::Grocery, &user, grocery_request(PaymentMethod::Card))
            .await
            .unwrap();

        for expected in 1..=3 {
            let issued = f
                .service
                .resend_otp(Vertical::Grocery, &user, order.id, OtpKind::Delivery)
                .await
                .unwrap();
            assert_eq!(issued.resend_count, expected);
        }

        let fourth = f
            .service
            .resend_otp(Vertical::Grocery, &user, order.id, OtpKind::Delivery)
            .await;
        assert!(matches!(
            fourth,
            Err(LifecycleError::Otp(OtpError::ResendLimitExceeded))
        ));
    }

    #[tokio::test]
    async fn test_verify_delivery_code() {
        let f = fixture();
        let user = customer();
        let order = f
            .service
            .create_order(Vertical::Grocery, &user, grocery_request(PaymentMethod::Card))
            .await
            .unwrap();
        let code = order.payment_details.delivery_otp.as_ref().unwrap().code.clone();

        let assignment = f
            .ledger
            .find_by_order(order.id, Vertical::Grocery)
            .await
            .unwrap()
            .unwrap();
        let rider = Principal::new(Uuid::new_v4(), UserRole::Rider);

        let unassigned = f
            .service
            .verify_otp(Vertical::Grocery, &rider, order.id, OtpKind::Delivery, &code)
            .await;
        assert!(matches!(unassigned, Err(LifecycleError::Forbidden(_))));

        f.ledger.accept(assignment.id, rider.id).await.unwrap();

        let wrong = if code == "000000" { "111111" } else { "000000" };
        let mismatch = f
            .service
            .verify_otp(Vertical::Grocery, &rider, order.id, OtpKind::Delivery, wrong)
            .await;
        assert!(matches!(
            mismatch,
            Err(LifecycleError::Otp(OtpError::Mismatch { attempts_left: 4 }))
        ));

        let delivered = f
            .service
            .verify_otp(Vertical::Grocery, &rider, order.id, OtpKind::Delivery, &code)
            .await
            .unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);

        let synced = f.ledger.get(assignment.id).await.unwrap();
        assert_eq!(synced.status, AssignmentStatus::Delivered);
    }

    #[tokio::test]
    async fn test_reconcile_repairs_drift() {
        let f = fixture();
        let user = customer();
        let order = f
            .service
            .create_order(Vertical::Porter, &user, ride_request(Some(300)))
            .await
            .unwrap();

        // Write the order status directly, bypassing the sync
        let mut drifted = order.clone();
        drifted.status = OrderStatus::Accepted;
        f.store.save_order(&drifted, None).await.unwrap();

        let report = f
            .service
            .reconcile_since(order.created_at - chrono::Duration::minutes(1), 100)
            .await
            .unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.repaired, 1);

        let assignment = f
            .ledger
            .find_by_order(order.id, Vertical::Porter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Accepted);
    }
}
