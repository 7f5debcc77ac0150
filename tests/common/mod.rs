//! Shared helpers for HTTP-level tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use marketplace_server::auth::Principal;
use marketplace_server::config::Config;
use marketplace_server::models::UserRole;
use marketplace_server::state::AppState;
use marketplace_server::store::MemoryStore;
use marketplace_server::{build_state, routes};

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

/// A caller with a signed access token
pub struct Caller {
    pub principal: Principal,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let config = Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some("integration-test-secret".to_string()),
            "DEFAULT_DELIVERY_FEE" => Some("0".to_string()),
            _ => None,
        })
        .expect("test config");

        let store = Arc::new(MemoryStore::new());
        let state = build_state(&config, store.clone());
        let router = routes::create_router(state.clone());

        Self {
            router,
            state,
            store,
        }
    }

    pub fn caller(&self, role: UserRole) -> Caller {
        let principal = Principal::new(Uuid::new_v4(), role);
        let token = self
            .state
            .auth_service
            .issue_token(&principal)
            .expect("token");
        Caller { principal, token }
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        caller: Option<&Caller>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder.header("authorization", format!("Bearer {}", caller.token));
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str, caller: &Caller) -> (StatusCode, Value) {
        self.send("GET", uri, Some(caller), None).await
    }

    pub async fn post(&self, uri: &str, caller: &Caller, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(caller), Some(body)).await
    }

    pub async fn put(&self, uri: &str, caller: &Caller, body: Value) -> (StatusCode, Value) {
        self.send("PUT", uri, Some(caller), Some(body)).await
    }
}

pub fn address(line: &str) -> Value {
    serde_json::json!({ "address": line, "city": "Pune" })
}

/// The `items=[{grocery_id:"G1", quantity:2, price:100}]` order
pub fn grocery_order_body() -> Value {
    serde_json::json!({
        "items": [{ "grocery_id": "G1", "quantity": 2, "price": 100 }],
        "delivery_address": address("12 Market Road"),
        "payment_method": "card"
    })
}

pub fn ride_order_body(fare: i64) -> Value {
    serde_json::json!({
        "pickup_address": address("Station Road"),
        "dropoff_address": address("Airport"),
        "payment_method": "wallet",
        "vehicle_type": "mini_truck",
        "fare": fare,
        "distance_km": 14.2,
        "duration_minutes": 35
    })
}

/// Place an order and return its JSON view
pub async fn place(app: &TestApp, vertical: &str, caller: &Caller, body: Value) -> Value {
    let (status, json) = app
        .post(&format!("/api/{vertical}-orders"), caller, body)
        .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {json}");
    json["data"].clone()
}
