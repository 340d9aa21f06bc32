//! HTTP API tests
//!
//! Drives the router end to end over the in-memory store:
//! - Property 12: Unauthenticated requests change nothing
//! - Permission checks per action
//! - Allocation, packaging and sale approval over HTTP

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use common::{Fixture, Kind};
use fulfillment_backend::middleware::Claims;
use fulfillment_backend::{create_app, AppState, Config, FulfillmentStore};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use shared::{OrderStatus, SaleStatus};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test-secret";

fn app(fx: &Fixture) -> Router {
    create_app(AppState::new(fx.dyn_store(), Config::local(SECRET)))
}

fn token(fx: &Fixture, role: &str, permissions: &[&str]) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: fx.actor.to_string(),
        company_id: fx.company_id.to_string(),
        role: role.to_string(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let request = match body {
        Some(payload) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&payload).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();

    let parsed = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, parsed)
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let fx = Fixture::new();
    let (status, body) = send(&app(&fx), Method::GET, "/api/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_missing_token_changes_nothing() {
    let fx = Fixture::new();
    let product = fx.product(Kind::Stocked, 10);
    let (order_id, _) = fx.order(&[(product, 2)]);
    let router = app(&fx);

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/fulfillment/allocate",
        None,
        Some(json!({ "order_id": order_id })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(fx.store.tracking_count().unwrap(), 0);
    assert_eq!(fx.order_status(order_id).await, OrderStatus::Pending);
}

#[tokio::test]
async fn test_forged_token_is_rejected() {
    let fx = Fixture::new();
    let router = app(&fx);
    let now = Utc::now().timestamp();
    let forged = encode(
        &Header::default(),
        &Claims {
            sub: fx.actor.to_string(),
            company_id: fx.company_id.to_string(),
            role: "admin".to_string(),
            permissions: Vec::new(),
            exp: now + 3600,
            iat: now,
        },
        &EncodingKey::from_secret(b"someone-else"),
    )
    .unwrap();

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/v1/fulfillment/allocate",
        Some(&forged),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_permission_is_forbidden() {
    let fx = Fixture::new();
    let product = fx.product(Kind::Stocked, 10);
    let (order_id, _) = fx.order(&[(product, 2)]);
    let router = app(&fx);
    let viewer = token(&fx, "viewer", &["packaging:update"]);

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/fulfillment/allocate",
        Some(&viewer),
        Some(json!({ "order_id": order_id })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_PERMISSIONS");
    assert_eq!(fx.store.tracking_count().unwrap(), 0);

    // Reads only need a valid token
    let uri = format!("/api/v1/orders/{}/tracking", order_id);
    let (status, body) = send(&router, Method::GET, &uri, Some(&viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

// ============================================================================
// Fulfillment Flow
// ============================================================================

#[tokio::test]
async fn test_allocate_package_and_sell_over_http() {
    let fx = Fixture::new();
    let product = fx.product(Kind::Stocked, 10);
    let (order_id, _) = fx.order(&[(product, 4)]);
    let router = app(&fx);
    let operator = token(
        &fx,
        "operator",
        &[
            "fulfillment:allocate",
            "packaging:update",
            "sales:create",
            "sales:approve",
        ],
    );

    let (status, results) = send(
        &router,
        Method::POST,
        "/api/v1/fulfillment/allocate",
        Some(&operator),
        Some(json!({ "order_id": order_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["new_status"], "in_packaging");

    let (status, jobs) = send(
        &router,
        Method::GET,
        "/api/v1/packaging?status=pending",
        Some(&operator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = jobs[0]["id"].as_str().unwrap().to_string();

    let status_uri = format!("/api/v1/packaging/{}/status", job_id);
    let (status, _) = send(
        &router,
        Method::PUT,
        &status_uri,
        Some(&operator),
        Some(json!({ "status": "in_progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, update) = send(
        &router,
        Method::PUT,
        &status_uri,
        Some(&operator),
        Some(json!({ "status": "approved", "quality_check": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(update["order_released"], true);
    assert_eq!(update["tracking"]["status"], "ready_for_sale");
    assert_eq!(fx.order_status(order_id).await, OrderStatus::ReleasedForSale);

    let sale_uri = format!("/api/v1/orders/{}/sale", order_id);
    let (status, creation) = send(&router, Method::POST, &sale_uri, Some(&operator), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let sale_id = creation["sale"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(&router, Method::POST, &sale_uri, Some(&operator), None).await;
    assert_eq!(status, StatusCode::OK);

    let approve_uri = format!("/api/v1/sales/{}/approve", sale_id);
    let (status, approval) = send(&router, Method::POST, &approve_uri, Some(&operator), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approval["sale"]["status"], "confirmed");
    assert_eq!(approval["receivable_created"], true);

    let (status, again) = send(&router, Method::POST, &approve_uri, Some(&operator), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["receivable_created"], false);

    let entries_uri = format!("/api/v1/sales/{}/financial-entries", sale_id);
    let (status, entries) = send(&router, Method::GET, &entries_uri, Some(&operator), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entries.as_array().map(Vec::len), Some(1));

    let sale = fx
        .store
        .get_sale(fx.company_id, Uuid::parse_str(&sale_id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sale.status, SaleStatus::Confirmed);
}

#[tokio::test]
async fn test_admin_role_bypasses_permissions() {
    let fx = Fixture::new();
    let product = fx.product(Kind::Stocked, 10);
    let (order_id, _) = fx.order(&[(product, 1)]);
    let router = app(&fx);
    let admin = token(&fx, "admin", &[]);

    let (status, results) = send(
        &router,
        Method::POST,
        "/api/v1/fulfillment/allocate",
        Some(&admin),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(results[0]["order_id"], order_id.to_string());
}

#[tokio::test]
async fn test_invalid_transition_is_a_client_error() {
    let fx = Fixture::new();
    let product = fx.product(Kind::Stocked, 10);
    let (order_id, _) = fx.order(&[(product, 1)]);
    let router = app(&fx);
    let admin = token(&fx, "admin", &[]);

    send(
        &router,
        Method::POST,
        "/api/v1/fulfillment/allocate",
        Some(&admin),
        Some(json!({ "order_id": order_id })),
    )
    .await;
    let job_id = fx.store.packaging_jobs().unwrap()[0].id;

    let (status, body) = send(
        &router,
        Method::PUT,
        &format!("/api/v1/packaging/{}/status", job_id),
        Some(&admin),
        Some(json!({ "status": "approved" })),
    )
    .await;

    assert!(status.is_client_error());
    assert!(body["error"]["code"].is_string());
    assert_eq!(fx.order_status(order_id).await, OrderStatus::InPackaging);
}

#[tokio::test]
async fn test_unknown_sale_is_not_found() {
    let fx = Fixture::new();
    let router = app(&fx);
    let admin = token(&fx, "admin", &[]);

    let uri = format!("/api/v1/sales/{}", Uuid::new_v4());
    let (status, body) = send(&router, Method::GET, &uri, Some(&admin), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
