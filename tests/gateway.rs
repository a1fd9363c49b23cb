use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use barber2go_client::auth::AuthGuard;
use barber2go_client::error::{OFFLINE_MESSAGE, SESSION_EXPIRED_MESSAGE, TIMEOUT_MESSAGE};
use barber2go_client::gateway::{Gateway, RestGateway};
use barber2go_client::models::{BookingRequest, BookingStatus, ClientSession};
use barber2go_client::session::SessionStore;
use barber2go_client::ApiError;
use rust_decimal::Decimal;
use serde_json::{json, Value};

#[derive(Default)]
struct Backend {
    barber_hits: AtomicUsize,
    last_authorization: Mutex<Option<String>>,
    created: Mutex<Option<Value>>,
}

async fn active_barbers(req: HttpRequest, backend: web::Data<Backend>) -> HttpResponse {
    backend.barber_hits.fetch_add(1, Ordering::SeqCst);
    let authorization = req
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    *backend.last_authorization.lock().unwrap() = authorization;
    HttpResponse::Unauthorized().finish()
}

async fn services() -> HttpResponse {
    HttpResponse::Ok().json(json!([
        {"id": 1, "name": "Cut", "description": null, "estimatedMinutes": 30, "price": 25.5},
        {"id": 2, "name": "Beard", "description": "Trim", "estimatedMinutes": 20, "price": "15.00"}
    ]))
}

async fn create_booking(body: web::Json<Value>, backend: web::Data<Backend>) -> HttpResponse {
    let body = body.into_inner();
    *backend.created.lock().unwrap() = Some(body.clone());
    HttpResponse::Created().json(json!({
        "id": 41,
        "clientName": "Ana Torres",
        "barberName": "Luis",
        "fechaReserva": body["fechaReserva"],
        "status": "PENDING",
        "startTime": body["startTime"],
        "endTime": "15:20:00"
    }))
}

async fn cancel_booking(path: web::Path<i64>) -> HttpResponse {
    match path.into_inner() {
        5 => HttpResponse::Conflict().json(json!({"message": "Booking 5 is already completed"})),
        6 => HttpResponse::BadRequest().finish(),
        id => HttpResponse::Ok().json(json!({"id": id, "status": "CANCELLED"})),
    }
}

async fn booking_detail() -> HttpResponse {
    HttpResponse::InternalServerError().finish()
}

async fn login(query: web::Query<std::collections::HashMap<String, String>>) -> HttpResponse {
    match query.get("email").map(String::as_str) {
        Some("ana@example.com") => HttpResponse::Ok().json(json!({
            "id": 9,
            "nombres": "Ana Torres",
            "genero": "F",
            "email": "ana@example.com",
            "telefono": "611111111",
            "dni": "12345678"
        })),
        _ => HttpResponse::NotFound().finish(),
    }
}

async fn forbidden_profile() -> HttpResponse {
    HttpResponse::Forbidden().finish()
}

async fn slow() -> HttpResponse {
    tokio::time::sleep(Duration::from_secs(2)).await;
    HttpResponse::Ok().json(json!([]))
}

fn spawn_backend() -> (String, Arc<Backend>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    let backend = web::Data::new(Backend::default());
    let shared = backend.clone().into_inner();

    let server = HttpServer::new(move || {
        App::new().app_data(backend.clone()).service(
            web::scope("/api/v1")
                .route("/barbers/active", web::get().to(active_barbers))
                .route("/services", web::get().to(services))
                .route("/bookings", web::post().to(create_booking))
                .route("/bookings/{id}/cancel", web::put().to(cancel_booking))
                .route("/bookings/{id}", web::get().to(booking_detail))
                .route("/clients/login", web::get().to(login))
                .route("/clients/{id}/profile", web::get().to(forbidden_profile))
                .route("/clients/{id}/bookings", web::get().to(slow)),
        )
    })
    .workers(1)
    .listen(listener)
    .expect("listen")
    .run();
    tokio::spawn(server);

    (format!("http://127.0.0.1:{port}/api/v1"), shared)
}

async fn logged_in_session() -> SessionStore {
    let session = SessionStore::in_memory();
    session
        .save(&ClientSession {
            client_id: 9,
            user_id: 9,
            name: "Ana Torres".to_string(),
            logged_in: true,
            ..ClientSession::default()
        })
        .await
        .unwrap();
    session
}

fn gateway(base_url: &str, guard: Arc<AuthGuard>) -> RestGateway {
    RestGateway::new(base_url, Duration::from_millis(500), guard).unwrap()
}

#[tokio::test]
async fn rejected_token_clears_the_session_once_without_retry() {
    let (url, backend) = spawn_backend();
    let session = logged_in_session().await;
    let guard = Arc::new(AuthGuard::new(session.clone()));
    guard.set_token("stale-token");
    let gateway = gateway(&url, guard.clone());

    let err = gateway.get_active_barbers().await.unwrap_err();

    assert_eq!(err, ApiError::Auth(SESSION_EXPIRED_MESSAGE.to_string()));
    assert_eq!(backend.barber_hits.load(Ordering::SeqCst), 1);
    assert_eq!(
        backend.last_authorization.lock().unwrap().as_deref(),
        Some("Bearer stale-token")
    );
    assert_eq!(guard.token(), None);
    assert!(!session.load().await.unwrap().logged_in);
}

#[tokio::test]
async fn anonymous_rejection_keeps_the_session() {
    let (url, backend) = spawn_backend();
    let session = logged_in_session().await;
    let gateway = gateway(&url, Arc::new(AuthGuard::new(session.clone())));

    let err = gateway.get_active_barbers().await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(backend.barber_hits.load(Ordering::SeqCst), 1);
    assert_eq!(*backend.last_authorization.lock().unwrap(), None);
    assert_eq!(session.load().await.unwrap().active_client_id(), Some(9));
}

#[tokio::test]
async fn forbidden_is_not_a_logout() {
    let (url, _) = spawn_backend();
    let session = logged_in_session().await;
    let guard = Arc::new(AuthGuard::new(session.clone()));
    guard.set_token("valid-token");
    let gateway = gateway(&url, guard.clone());

    let err = gateway.get_client_profile(9).await.unwrap_err();

    assert_eq!(err, ApiError::Unknown("Server error (403)".to_string()));
    assert_eq!(guard.token().as_deref(), Some("valid-token"));
    assert_eq!(session.load().await.unwrap().active_client_id(), Some(9));
}

#[tokio::test]
async fn create_booking_sends_the_wire_payload() {
    let (url, backend) = spawn_backend();
    let gateway = gateway(&url, Arc::new(AuthGuard::new(SessionStore::in_memory())));

    let booking = gateway
        .create_booking(&BookingRequest {
            client_id: 9,
            barber_id: 3,
            date: "2025-06-10".to_string(),
            start_time: "14:30:00".to_string(),
            service_ids: vec![1, 2],
        })
        .await
        .unwrap();

    assert_eq!(booking.id, 41);
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.date, "2025-06-10");
    assert_eq!(
        backend.created.lock().unwrap().clone().unwrap(),
        json!({
            "clientId": 9,
            "barberId": 3,
            "fechaReserva": "2025-06-10",
            "startTime": "14:30:00",
            "serviceIds": [1, 2]
        })
    );
}

#[tokio::test]
async fn services_decode_numeric_and_string_prices() {
    let (url, _) = spawn_backend();
    let gateway = gateway(&url, Arc::new(AuthGuard::new(SessionStore::in_memory())));

    let services = gateway.get_all_services().await.unwrap();
    assert_eq!(services.len(), 2);
    assert_eq!(services[0].duration_minutes, 30);
    assert_eq!(services[0].price, Decimal::new(255, 1));
    assert_eq!(services[1].price, Decimal::new(15, 0));
    assert_eq!(services[1].description, "Trim");
}

#[tokio::test]
async fn backend_message_wins_over_the_status_table() {
    let (url, _) = spawn_backend();
    let gateway = gateway(&url, Arc::new(AuthGuard::new(SessionStore::in_memory())));

    let err = gateway.cancel_booking(5).await.unwrap_err();
    assert_eq!(err, ApiError::Conflict("Booking 5 is already completed".to_string()));

    let err = gateway.cancel_booking(6).await.unwrap_err();
    assert_eq!(err, ApiError::Conflict("Cannot cancel this booking.".to_string()));

    let cancelled = gateway.cancel_booking(7).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn unmapped_status_reports_the_code() {
    let (url, _) = spawn_backend();
    let gateway = gateway(&url, Arc::new(AuthGuard::new(SessionStore::in_memory())));

    let err = gateway.get_booking_by_id(3).await.unwrap_err();
    assert_eq!(err, ApiError::Unknown("Server error (500)".to_string()));
}

#[tokio::test]
async fn login_maps_unknown_email_to_not_found() {
    let (url, _) = spawn_backend();
    let gateway = gateway(&url, Arc::new(AuthGuard::new(SessionStore::in_memory())));

    let profile = gateway.login_by_email("ana@example.com").await.unwrap();
    assert_eq!(profile.id, 9);
    assert_eq!(profile.document_id, "12345678");

    let err = gateway.login_by_email("ghost@example.com").await.unwrap_err();
    assert_eq!(err, ApiError::NotFound("No client found with that email.".to_string()));
}

#[tokio::test]
async fn slow_backend_is_a_timeout() {
    let (url, _) = spawn_backend();
    let gateway = gateway(&url, Arc::new(AuthGuard::new(SessionStore::in_memory())));

    let err = gateway.get_client_bookings(9).await.unwrap_err();
    assert_eq!(err, ApiError::Connectivity(TIMEOUT_MESSAGE.to_string()));
}

#[tokio::test]
async fn unreachable_backend_is_offline() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let gateway = gateway(
        &format!("http://127.0.0.1:{port}/api/v1"),
        Arc::new(AuthGuard::new(SessionStore::in_memory())),
    );

    let err = gateway.get_all_services().await.unwrap_err();
    assert_eq!(err, ApiError::Connectivity(OFFLINE_MESSAGE.to_string()));
}
