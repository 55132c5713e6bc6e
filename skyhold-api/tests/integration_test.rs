use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use skyhold_api::middleware::CustomerClaims;
use skyhold_api::{app, worker, AppState, AuthConfig};
use skyhold_core::catalog::{FlightClass, FlightSummary};
use skyhold_core::identity::UserProfile;
use skyhold_core::repository::BookingRepository;
use skyhold_core::{BookingStatus, SeatClass};
use skyhold_order::{ExpirySweeper, MockPaymentAdapter, OrderAssembler, OrderItem, PaymentReconciler};
use skyhold_shared::Masked;
use skyhold_store::MemoryStore;
use std::sync::Arc;
use tokio::sync::watch;
use tower::ServiceExt;

const JWT_SECRET: &str = "integration-secret";
const CALLBACK_TOKEN: &str = "integration-callback";

async fn test_state() -> AppState {
    let store = Arc::new(MemoryStore::new());
    for (id, name) in [(1, "Budi Santoso"), (2, "Sari Dewi")] {
        store
            .add_user(UserProfile {
                id,
                full_name: name.to_string(),
                email: Masked::new(format!("user{}@example.com", id)),
            })
            .await;
    }

    let departure = Utc.with_ymd_and_hms(2030, 3, 1, 6, 0, 0).unwrap();
    store
        .add_flight(FlightSummary {
            id: 1,
            flight_code: "SK101".to_string(),
            origin: "CGK".to_string(),
            destination: "DPS".to_string(),
            departure_time: departure,
            arrival_time: departure + Duration::hours(2),
            classes: vec![FlightClass {
                flight_id: 1,
                seat_class: SeatClass::Economy,
                price: dec!(1250000),
                total_seats: 5,
            }],
        })
        .await;

    AppState {
        assembler: Arc::new(OrderAssembler::new(store.clone(), store.clone(), store.clone())),
        reconciler: Arc::new(PaymentReconciler::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(MockPaymentAdapter::new()),
            CALLBACK_TOKEN,
            "IDR",
        )),
        bookings: store.clone(),
        catalog: store,
        redis: None,
        auth: AuthConfig {
            secret: JWT_SECRET.to_string(),
        },
    }
}

fn token_for(user_id: i64) -> String {
    let claims = CustomerClaims {
        sub: user_id.to_string(),
        role: "CUSTOMER".to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}

fn passengers(count: usize) -> Value {
    (0..count)
        .map(|i| {
            json!({
                "title": "Mr",
                "full_name": format!("Passenger {}", i),
                "dob": "1990-05-17",
                "nationality": "ID"
            })
        })
        .collect()
}

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn authed(method: &str, uri: &str, user_id: i64, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token_for(user_id)))
        .header("content-type", "application/json");
    match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn webhook(token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/webhooks/payments")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("x-callback-token", token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_health() {
    let state = test_state().await;
    let response = app(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_customer_routes_require_token() {
    let state = test_state().await;
    let request = Request::builder()
        .method("POST")
        .uri("/v1/orders")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "items": [] }).to_string()))
        .unwrap();

    let (status, _) = send(&state, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_order_payment_settlement_flow() {
    let state = test_state().await;

    // 1. Create order
    let (status, order) = send(
        &state,
        authed(
            "POST",
            "/v1/orders",
            1,
            Some(json!({
                "items": [{ "flight_id": 1, "seat_class": "Economy", "passengers": passengers(2) }]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["trip_type"], "one_way");
    let order_id = order["order_id"].as_str().unwrap().to_string();

    // 2. Initiate payment
    let (status, payment) = send(
        &state,
        authed(
            "POST",
            "/v1/payments",
            1,
            Some(json!({ "order_id": order_id, "payment_type": "bank_transfer", "bank": "bni" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["status"], "PENDING");
    assert_eq!(payment["display"]["kind"], "virtual_account");
    let transaction_id = payment["transaction_id"].as_str().unwrap().to_string();

    let notification = json!({
        "transaction_id": transaction_id,
        "order_id": order_id,
        "transaction_status": "settlement",
        "status_code": "200"
    });

    // 3. Unauthenticated webhook is rejected
    let (status, _) = send(&state, webhook(Some("wrong"), notification.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 4. Settlement, delivered twice
    let (status, body) = send(&state, webhook(Some(CALLBACK_TOKEN), notification.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");
    let (status, body) = send(&state, webhook(Some(CALLBACK_TOKEN), notification)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "already_settled");

    // 5. Order reads back as paid, deadline no longer shown
    let (status, order) = send(&state, authed("GET", &format!("/v1/orders/{}", order_id), 1, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "paid");
    assert!(order.get("expires_at").is_none());
    assert_eq!(order["bookings"][0]["flight"]["flight_code"], "SK101");
    assert_eq!(order["bookings"][0]["passengers"].as_array().unwrap().len(), 2);

    let (status, history) = send(&state, authed("GET", "/v1/bookings", 1, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);

    // 6. Paying again conflicts
    let (status, _) = send(
        &state,
        authed("POST", "/v1/payments", 1, Some(json!({ "order_id": order_id, "payment_type": "qris" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_order_errors_map_to_status_codes() {
    let state = test_state().await;

    let (status, body) = send(
        &state,
        authed(
            "POST",
            "/v1/orders",
            1,
            Some(json!({ "items": [{ "flight_id": 1, "seat_class": "economy", "passengers": passengers(6) }] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Insufficient inventory"));

    let (status, _) = send(
        &state,
        authed(
            "POST",
            "/v1/orders",
            1,
            Some(json!({ "items": [{ "flight_id": 1, "seat_class": "business", "passengers": passengers(1) }] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &state,
        authed(
            "POST",
            "/v1/orders",
            1,
            Some(json!({ "items": [{ "flight_id": 77, "seat_class": "economy", "passengers": passengers(1) }] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_foreign_order_is_hidden() {
    let state = test_state().await;

    let (_, order) = send(
        &state,
        authed(
            "POST",
            "/v1/orders",
            1,
            Some(json!({ "items": [{ "flight_id": 1, "seat_class": "economy", "passengers": passengers(1) }] })),
        ),
    )
    .await;
    let order_id = order["order_id"].as_str().unwrap();

    let (status, _) = send(&state, authed("GET", &format!("/v1/orders/{}", order_id), 2, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, history) = send(&state, authed("GET", "/v1/bookings", 2, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_expiry_worker_sweeps_and_stops_on_shutdown() {
    let state = test_state().await;
    let item: OrderItem = serde_json::from_value(json!({
        "flight_id": 1,
        "seat_class": "economy",
        "passengers": passengers(2)
    }))
    .unwrap();
    let order = state
        .assembler
        .create_order_at(1, vec![item], Utc::now() - Duration::hours(2))
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = Arc::new(ExpirySweeper::new(state.bookings.clone()));
    let handle = tokio::spawn(worker::start_expiry_worker(
        sweeper,
        std::time::Duration::from_millis(20),
        shutdown_rx,
    ));

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();

    let bookings = state.bookings.find_by_order_id(&order.order_id).await.unwrap();
    assert!(bookings.iter().all(|b| b.status == BookingStatus::Cancelled));
}
