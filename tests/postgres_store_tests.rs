//! Order lifecycle against a real PostgreSQL database

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::PgPool;
    use std::sync::Arc;
    use uuid::Uuid;

    use marketplace_server::assignment::AssignmentStatus;
    use marketplace_server::auth::Principal;
    use marketplace_server::config::Config;
    use marketplace_server::models::UserRole;
    use marketplace_server::order::{CreateOrderRequest, OrderStatus, Vertical};
    use marketplace_server::state::AppState;
    use marketplace_server::store::{OrderStore, PgStore, StoreError};
    use marketplace_server::{build_state, db};

    /// Helper to create a migrated test database pool
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/marketplace_test".to_string());

        let pool = db::create_pool(&database_url, 2)
            .await
            .expect("Failed to connect to test database");
        db::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    fn setup_state(pool: PgPool) -> (AppState, Arc<PgStore>) {
        let config = Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some("postgres-test-secret".to_string()),
            _ => None,
        })
        .expect("test config");
        let store = Arc::new(PgStore::new(pool));
        (build_state(&config, store.clone()), store)
    }

    fn grocery_request() -> CreateOrderRequest {
        serde_json::from_value(json!({
            "items": [
                { "grocery_id": "G1", "name": "Rice", "quantity": 2, "price": 100 },
                { "grocery_id": "G2", "name": "Milk", "quantity": 1, "price": 60 }
            ],
            "delivery_address": { "address": "12 Market Road", "city": "Pune" },
            "payment_method": "cash_on_delivery"
        }))
        .expect("request")
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_order_and_assignment_written_together() {
        let (state, store) = setup_state(setup_test_db().await);
        let customer = Principal::new(Uuid::new_v4(), UserRole::Customer);

        let order = state
            .lifecycle
            .create_order(Vertical::Grocery, &customer, grocery_request())
            .await
            .expect("order creation should succeed");

        let stored = store
            .get_order(Vertical::Grocery, order.id)
            .await
            .unwrap()
            .expect("order should be stored");
        assert_eq!(stored.items.len(), 2);
        assert_eq!(stored.subtotal, 260);
        assert!(stored.payment_details.delivery_otp.is_some());
        assert!(stored.payment_details.cod_otp.is_some());

        let assignment = store
            .find_assignment(order.id, Vertical::Grocery)
            .await
            .unwrap()
            .expect("assignment should be stored");
        assert_eq!(assignment.status, AssignmentStatus::Assigned);
        assert!(assignment.rider_id.is_none());

        // Orders are scoped to their vertical
        assert!(store
            .get_order(Vertical::Taxi, order.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_status_update_mirrors_assignment() {
        let (state, store) = setup_state(setup_test_db().await);
        let customer = Principal::new(Uuid::new_v4(), UserRole::Customer);

        let order = state
            .lifecycle
            .create_order(Vertical::Grocery, &customer, grocery_request())
            .await
            .unwrap();

        let updated = state
            .lifecycle
            .update_status(
                Vertical::Grocery,
                &customer,
                order.id,
                OrderStatus::OutForDelivery,
            )
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::OutForDelivery);
        assert_eq!(updated.version, order.version + 1);

        let assignment = store
            .find_assignment(order.id, Vertical::Grocery)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment.status, AssignmentStatus::PickedUp);
        assert!(assignment.picked_up_at.is_some());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_stale_order_write_is_rejected() {
        let (state, store) = setup_state(setup_test_db().await);
        let customer = Principal::new(Uuid::new_v4(), UserRole::Customer);

        let order = state
            .lifecycle
            .create_order(Vertical::Grocery, &customer, grocery_request())
            .await
            .unwrap();

        let mut first = order.clone();
        first.status = OrderStatus::Confirmed;
        store.save_order(&first, None).await.unwrap();

        let mut second = order.clone();
        second.status = OrderStatus::Cancelled;
        let result = store.save_order(&second, None).await;
        assert!(matches!(result, Err(StoreError::StaleOrder)));

        let stored = store
            .get_order(Vertical::Grocery, order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_reconcile_repairs_drift() {
        let (state, store) = setup_state(setup_test_db().await);
        let customer = Principal::new(Uuid::new_v4(), UserRole::Customer);
        let since = chrono::Utc::now() - chrono::Duration::seconds(5);

        let order = state
            .lifecycle
            .create_order(Vertical::Grocery, &customer, grocery_request())
            .await
            .unwrap();

        // Order moves without its assignment
        let mut drifted = order.clone();
        drifted.status = OrderStatus::Processing;
        drifted.updated_at = chrono::Utc::now();
        store.save_order(&drifted, None).await.unwrap();

        let report = state.lifecycle.reconcile_since(since, 500).await.unwrap();
        assert!(report.repaired >= 1);

        let assignment = store
            .find_assignment(order.id, Vertical::Grocery)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Accepted);
    }
}
