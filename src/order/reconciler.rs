//! Background sweep that keeps assignments in step with their orders

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::{LifecycleError, LifecycleService, ReconcileReport};

/// Orders examined per batch
const BATCH_SIZE: i64 = 500;

/// Look-back used on the first sweep after startup
const INITIAL_WINDOW_HOURS: i64 = 24;

/// Periodically repair assignment drift left by skipped syncs
pub async fn assignment_reconciler(service: Arc<LifecycleService>, interval: Duration) {
    tracing::info!(interval_secs = interval.as_secs(), "Starting assignment reconciler");

    let overlap = ChronoDuration::from_std(interval).unwrap_or_else(|_| ChronoDuration::minutes(1));
    let mut since = Utc::now() - ChronoDuration::hours(INITIAL_WINDOW_HOURS);

    loop {
        tokio::time::sleep(interval).await;

        let started = Utc::now();
        match sweep_since(&service, since, BATCH_SIZE).await {
            Ok(report) => {
                if report.repaired > 0 || report.skipped > 0 {
                    tracing::info!(
                        scanned = report.scanned,
                        repaired = report.repaired,
                        skipped = report.skipped,
                        "Reconciliation sweep finished"
                    );
                }
                // Overlap windows so writes racing the sweep are seen next time
                since = started - overlap;
            }
            Err(e) => {
                tracing::error!("Error reconciling assignments: {}", e);
            }
        }
    }
}

/// Reconcile every order updated at or after `since`, one batch at a time.
///
/// A full batch moves the cursor to the newest `updated_at` it saw and
/// fetches again; rows sharing that timestamp are re-scanned, which is
/// harmless since repairs are idempotent.
pub async fn sweep_since(
    service: &LifecycleService,
    since: DateTime<Utc>,
    batch_size: i64,
) -> Result<ReconcileReport, LifecycleError> {
    let mut cursor = since;
    let mut total = ReconcileReport::default();

    loop {
        let batch = service.reconcile_since(cursor, batch_size).await?;
        total.scanned += batch.scanned;
        total.repaired += batch.repaired;
        total.skipped += batch.skipped;
        total.last_updated_at = batch.last_updated_at.or(total.last_updated_at);

        if (batch.scanned as i64) < batch_size {
            return Ok(total);
        }
        match batch.last_updated_at {
            Some(last) if last > cursor => cursor = last,
            _ => {
                tracing::warn!(
                    cursor = %cursor,
                    batch_size,
                    "Reconciliation batch did not advance, stopping sweep early"
                );
                return Ok(total);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::{AssignmentLedger, AssignmentStatus};
    use crate::auth::Principal;
    use crate::config::OtpPolicies;
    use crate::models::UserRole;
    use crate::order::{CreateOrderRequest, OrderStatus, Vertical};
    use crate::store::{MemoryStore, OrderStore};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_sweep_pages_past_full_batches() {
        let store = Arc::new(MemoryStore::new());
        let ledger = AssignmentLedger::new(store.clone(), 80);
        let service =
            LifecycleService::new(store.clone(), ledger.clone(), OtpPolicies::default(), 0);
        let customer = Principal::new(Uuid::new_v4(), UserRole::Customer);
        let start = Utc::now() - ChronoDuration::minutes(10);

        let mut ids = Vec::new();
        for i in 0..5 {
            let req: CreateOrderRequest = serde_json::from_value(serde_json::json!({
                "items": [{ "grocery_id": "G1", "quantity": 1, "price": 100 }],
                "delivery_address": { "address": "12 Market Road" },
                "payment_method": "card"
            }))
            .unwrap();
            let order = service
                .create_order(Vertical::Grocery, &customer, req)
                .await
                .unwrap();

            // Move the order without its assignment, at distinct times
            let mut drifted = order.clone();
            drifted.status = OrderStatus::Processing;
            drifted.updated_at = start + ChronoDuration::seconds(i);
            store.save_order(&drifted, None).await.unwrap();
            ids.push(order.id);
        }

        let report = sweep_since(&service, start, 2).await.unwrap();
        assert_eq!(report.repaired, 5);
        assert_eq!(
            report.last_updated_at,
            Some(start + ChronoDuration::seconds(4))
        );

        for id in ids {
            let assignment = ledger
                .find_by_order(id, Vertical::Grocery)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(assignment.status, AssignmentStatus::Accepted);
        }
    }
}
