//! Production job tests
//!
//! Covers:
//! - Property 11: Completing production hands goods to packaging
//! - Production transitions and resumable completion
//! - Full manufactured-line flow from allocation to release

mod common;

use common::{Fixture, Kind};
use fulfillment_backend::services::packaging::UpdatePackagingStatusInput;
use fulfillment_backend::services::production::CompleteProductionInput;
use fulfillment_backend::{AppError, FulfillmentStore};
use shared::{OrderStatus, PackagingOrigin, PackagingStatus, ProductionJob, ProductionStatus, TrackingStatus};
use tokio_test::assert_ok;
use uuid::Uuid;

async fn allocate_production(fx: &Fixture, order_id: Uuid) -> ProductionJob {
    assert_ok!(fx.allocation().allocate(fx.company_id, fx.actor, Some(order_id)).await);
    fx.store
        .production_jobs()
        .unwrap()
        .into_iter()
        .find(|j| j.order_id == Some(order_id))
        .expect("production job created")
}

async fn approve(fx: &Fixture, job_id: Uuid) -> bool {
    let service = fx.packaging();
    for status in [PackagingStatus::InProgress, PackagingStatus::Approved] {
        let update = assert_ok!(
            service
                .update_status(
                    fx.company_id,
                    fx.actor,
                    job_id,
                    UpdatePackagingStatusInput {
                        status,
                        quantity_packaged: None,
                        quality_check: None,
                    },
                )
                .await
        );
        if update.order_released {
            return true;
        }
    }
    false
}

// ============================================================================
// Transitions
// ============================================================================

#[tokio::test]
async fn test_start_stamps_operator() {
    let fx = Fixture::new();
    let product = fx.product(Kind::Manufactured, 0);
    let (order_id, _) = fx.order(&[(product, 5)]);
    let job = allocate_production(&fx, order_id).await;

    let started = assert_ok!(fx.production().start_job(fx.company_id, fx.actor, job.id).await);

    assert_eq!(started.status, ProductionStatus::InProgress);
    assert_eq!(started.started_by, Some(fx.actor));
    assert!(started.started_at.is_some());

    let again = fx.production().start_job(fx.company_id, fx.actor, job.id).await;
    assert!(matches!(again, Err(AppError::InvalidStateTransition(_))));
}

#[tokio::test]
async fn test_completing_again_creates_no_second_packaging_job() {
    let fx = Fixture::new();
    let product = fx.product(Kind::Manufactured, 0);
    let (order_id, _) = fx.order(&[(product, 5)]);
    let job = allocate_production(&fx, order_id).await;
    let service = fx.production();

    let first = assert_ok!(service.complete_job(fx.company_id, fx.actor, job.id, CompleteProductionInput::default()).await);
    let again = assert_ok!(
        service
            .complete_job(
                fx.company_id,
                fx.actor,
                job.id,
                CompleteProductionInput {
                    quantity_produced: Some(2),
                },
            )
            .await
    );

    assert_eq!(again.job.quantity_produced, 5);
    assert_eq!(again.job.completed_at, first.job.completed_at);
    assert_eq!(
        again.packaging_job.map(|j| j.id),
        first.packaging_job.map(|j| j.id)
    );
    let production_packaging = fx
        .store
        .packaging_jobs()
        .unwrap()
        .into_iter()
        .filter(|j| j.origin == PackagingOrigin::Production)
        .count();
    assert_eq!(production_packaging, 1);
}

#[tokio::test]
async fn test_failed_hand_off_is_finished_by_retry() {
    let fx = Fixture::new();
    let product = fx.product(Kind::Manufactured, 0);
    let (order_id, items) = fx.order(&[(product, 5)]);
    let job = allocate_production(&fx, order_id).await;
    let service = fx.production();

    fx.store.fail_next_packaging_insert();
    let failed = service
        .complete_job(fx.company_id, fx.actor, job.id, CompleteProductionInput::default())
        .await;

    assert!(matches!(failed, Err(AppError::Internal(_))));
    assert_eq!(
        service.get_job(fx.company_id, job.id).await.unwrap().status,
        ProductionStatus::Completed
    );
    assert!(fx.store.packaging_jobs().unwrap().is_empty());
    assert_eq!(fx.order_status(order_id).await, OrderStatus::InProduction);

    let retry = assert_ok!(
        service
            .complete_job(fx.company_id, fx.actor, job.id, CompleteProductionInput::default())
            .await
    );

    let packaging = retry.packaging_job.expect("packaging job created");
    assert_eq!(packaging.origin, PackagingOrigin::Production);
    assert_eq!(packaging.quantity_to_package, 5);
    assert_eq!(fx.store.packaging_jobs().unwrap().len(), 1);

    let tracking = fx
        .store
        .find_tracking_by_item(fx.company_id, items[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tracking.status, TrackingStatus::InPackaging);
    assert_eq!(fx.order_status(order_id).await, OrderStatus::InPackaging);

    assert!(approve(&fx, packaging.id).await);
    assert_eq!(fx.order_status(order_id).await, OrderStatus::ReleasedForSale);
}

#[tokio::test]
async fn test_zero_produced_is_rejected() {
    let fx = Fixture::new();
    let product = fx.product(Kind::Manufactured, 0);
    let (order_id, _) = fx.order(&[(product, 5)]);
    let job = allocate_production(&fx, order_id).await;

    let result = fx
        .production()
        .complete_job(
            fx.company_id,
            fx.actor,
            job.id,
            CompleteProductionInput {
                quantity_produced: Some(0),
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::ValidationError(_))));
    assert_eq!(
        fx.production().get_job(fx.company_id, job.id).await.unwrap().status,
        ProductionStatus::Pending
    );
}

// ============================================================================
// Completion Cascade
// ============================================================================

#[tokio::test]
async fn test_completion_creates_production_packaging_job() {
    let fx = Fixture::new();
    let product = fx.product(Kind::Manufactured, 0);
    let (order_id, items) = fx.order(&[(product, 5)]);
    let job = allocate_production(&fx, order_id).await;
    assert_eq!(fx.order_status(order_id).await, OrderStatus::InProduction);

    assert_ok!(fx.production().start_job(fx.company_id, fx.actor, job.id).await);
    let completion = assert_ok!(
        fx.production()
            .complete_job(fx.company_id, fx.actor, job.id, CompleteProductionInput::default())
            .await
    );

    assert_eq!(completion.job.status, ProductionStatus::Completed);
    assert_eq!(completion.job.quantity_produced, 5);
    assert_eq!(completion.job.completed_by, Some(fx.actor));

    let packaging = completion.packaging_job.expect("packaging job created");
    assert_eq!(packaging.origin, PackagingOrigin::Production);
    assert_eq!(packaging.quantity_to_package, 5);
    assert_eq!(packaging.order_id, Some(order_id));
    assert_eq!(packaging.tracking_id, job.tracking_id);

    let tracking = fx
        .store
        .find_tracking_by_item(fx.company_id, items[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tracking.status, TrackingStatus::InPackaging);
    assert_eq!(fx.order_status(order_id).await, OrderStatus::InPackaging);
}

#[tokio::test]
async fn test_order_stays_in_production_while_other_lines_produce() {
    let fx = Fixture::new();
    let first = fx.product(Kind::Manufactured, 0);
    let second = fx.product(Kind::Manufactured, 0);
    let (order_id, _) = fx.order(&[(first, 2), (second, 3)]);
    assert_ok!(fx.allocation().allocate(fx.company_id, fx.actor, Some(order_id)).await);

    let jobs = fx.store.production_jobs().unwrap();
    assert_eq!(jobs.len(), 2);

    assert_ok!(
        fx.production()
            .complete_job(fx.company_id, fx.actor, jobs[0].id, CompleteProductionInput::default())
            .await
    );
    assert_eq!(fx.order_status(order_id).await, OrderStatus::InProduction);

    assert_ok!(
        fx.production()
            .complete_job(fx.company_id, fx.actor, jobs[1].id, CompleteProductionInput::default())
            .await
    );
    assert_eq!(fx.order_status(order_id).await, OrderStatus::InPackaging);
}

#[tokio::test]
async fn test_overproduction_packages_only_the_line_share() {
    let fx = Fixture::new();
    let product = fx.product(Kind::Manufactured, 0);
    let (order_id, _) = fx.order(&[(product, 5)]);
    let job = allocate_production(&fx, order_id).await;

    let completion = assert_ok!(
        fx.production()
            .complete_job(
                fx.company_id,
                fx.actor,
                job.id,
                CompleteProductionInput {
                    quantity_produced: Some(8),
                },
            )
            .await
    );

    assert_eq!(completion.job.quantity_produced, 8);
    assert_eq!(completion.packaging_job.unwrap().quantity_to_package, 5);
}

#[tokio::test]
async fn test_mixed_line_releases_after_both_jobs_are_approved() {
    let fx = Fixture::new();
    let product = fx.product(Kind::Manufactured, 3);
    let (order_id, items) = fx.order(&[(product, 10)]);
    let job = allocate_production(&fx, order_id).await;

    let stock_job = fx
        .store
        .packaging_jobs()
        .unwrap()
        .into_iter()
        .find(|j| j.origin == PackagingOrigin::Mixed)
        .expect("stock packaging job");
    assert!(!approve(&fx, stock_job.id).await);

    let completion = assert_ok!(
        fx.production()
            .complete_job(fx.company_id, fx.actor, job.id, CompleteProductionInput::default())
            .await
    );
    assert_eq!(fx.order_status(order_id).await, OrderStatus::InPackaging);

    let produced_job = completion.packaging_job.expect("packaging job created");
    assert!(approve(&fx, produced_job.id).await);

    let tracking = fx
        .store
        .find_tracking_by_item(fx.company_id, items[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tracking.quantity_packaged_approved, 10);
    assert_eq!(tracking.status, TrackingStatus::ReadyForSale);
    assert_eq!(fx.order_status(order_id).await, OrderStatus::ReleasedForSale);
}
