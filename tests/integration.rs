use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use parcel_tracker::api::rest::router;
use parcel_tracker::state::AppState;
use parcel_tracker::store::Store;
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> axum::Router {
    let state = AppState::new(Store::in_memory(), 1024, 4);
    router(Arc::new(state))
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn register(app: &axum::Router, email: &str) -> String {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            None,
            json!({
                "name": "Maxim",
                "email": email,
                "password": "secret1",
                "confirm_password": "secret1",
                "phone": "+7 (999) 123-45-67"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    body_json(res).await["token"].as_str().unwrap().to_string()
}

async fn create_package(app: &axum::Router, token: &str, lat: f64, lng: f64) -> Value {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/packages",
            Some(token),
            json!({
                "recipient_name": "Anna",
                "recipient_phone": "+7 (999) 100-200-300",
                "address": "Example St 1, apt 1",
                "location": { "lat": lat, "lng": lng }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    body_json(res).await
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(request("GET", "/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["users"], 0);
    assert_eq!(body["packages"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let token = register(&app, "metrics@example.com").await;
    create_package(&app, &token, 55.75, 37.61).await;

    let response = app.oneshot(request("GET", "/metrics", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("packages_created_total 1"));
}

#[tokio::test]
async fn register_rejects_mismatched_passwords() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/register",
            None,
            json!({
                "name": "Maxim",
                "email": "max@example.com",
                "password": "secret1",
                "confirm_password": "secret2"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_email_returns_409() {
    let app = setup();
    register(&app, "dup@example.com").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/register",
            None,
            json!({
                "name": "Other",
                "email": "dup@example.com",
                "password": "secret1",
                "confirm_password": "secret1"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_and_logout() {
    let app = setup();
    register(&app, "login@example.com").await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "login@example.com", "password": "secret1" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["user"]["email"], "login@example.com");
    assert!(body["user"].get("password_hash").is_none());
    let token = body["token"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(request("GET", "/me", Some(&token)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(request("POST", "/auth/logout", Some(&token)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = app.oneshot(request("GET", "/me", Some(&token))).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_credentials_return_401() {
    let app = setup();
    register(&app, "creds@example.com").await;

    let res = app
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "creds@example.com", "password": "nope" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn packages_require_session() {
    let app = setup();
    let res = app.oneshot(request("GET", "/packages", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_reset_flow() {
    let app = setup();
    register(&app, "reset@example.com").await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/password-reset",
            None,
            json!({ "email": "reset@example.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let reset_token = body_json(res).await["reset_token"]
        .as_str()
        .unwrap()
        .to_string();

    let confirm = json!({
        "email": "reset@example.com",
        "token": reset_token,
        "new_password": "brandnew",
        "confirm_password": "brandnew"
    });

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/password-reset/confirm",
            None,
            confirm.clone(),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/password-reset/confirm",
            None,
            confirm,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "reset@example.com", "password": "brandnew" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_package_returns_awaiting_shipment() {
    let app = setup();
    let token = register(&app, "pkg@example.com").await;

    let package = create_package(&app, &token, 55.75, 37.61).await;

    assert_eq!(package["status"], "awaiting_shipment");
    assert_eq!(package["cancelled"], false);
    assert!(package["route_id"].is_null());

    let code = package["tracking_code"].as_str().unwrap();
    assert_eq!(code.len(), 11);
    assert!(code[..2].chars().all(|c| c.is_ascii_uppercase()));
    assert!(code[2..].chars().all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn create_package_with_empty_address_returns_400() {
    let app = setup();
    let token = register(&app, "empty@example.com").await;

    let res = app
        .oneshot(json_request(
            "POST",
            "/packages",
            Some(&token),
            json!({
                "recipient_name": "Anna",
                "recipient_phone": "+7 (999) 100-200-300",
                "address": "",
                "location": { "lat": 55.75, "lng": 37.61 }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_filters_by_category_and_search() {
    let app = setup();
    let token = register(&app, "list@example.com").await;

    let first = create_package(&app, &token, 55.75, 37.61).await;
    let second = create_package(&app, &token, 55.76, 37.62).await;
    let second_id = second["id"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/packages/{second_id}/cancel"),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(request(
            "GET",
            "/packages?category=cancelled",
            Some(&token),
        ))
        .await
        .unwrap();
    let cancelled = body_json(res).await;
    let cancelled = cancelled.as_array().unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0]["id"], second["id"]);

    let res = app
        .clone()
        .oneshot(request("GET", "/packages?category=active", Some(&token)))
        .await
        .unwrap();
    let active = body_json(res).await;
    assert_eq!(active.as_array().unwrap().len(), 1);
    assert_eq!(active[0]["id"], first["id"]);

    let needle = first["tracking_code"].as_str().unwrap().to_lowercase();
    let res = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/packages?search={needle}"),
            Some(&token),
        ))
        .await
        .unwrap();
    let found = body_json(res).await;
    assert_eq!(found.as_array().unwrap().len(), 1);

    let res = app
        .oneshot(request(
            "GET",
            "/packages?category=date_range&start=2000-01-01",
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn other_users_package_is_404() {
    let app = setup();
    let owner = register(&app, "owner@example.com").await;
    let stranger = register(&app, "stranger@example.com").await;

    let package = create_package(&app, &owner, 55.75, 37.61).await;
    let id = package["id"].as_str().unwrap();

    let res = app
        .oneshot(request("GET", &format!("/packages/{id}"), Some(&stranger)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_delivery_flow() {
    let app = setup();
    let token = register(&app, "flow@example.com").await;
    let package = create_package(&app, &token, 54.0, 37.0).await;
    let id = package["id"].as_str().unwrap().to_string();
    let code = package["tracking_code"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(request("GET", &format!("/packages/{id}/route"), Some(&token)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let route = body_json(res).await;
    let points = route["points"].as_array().unwrap();
    assert_eq!(points.len(), 3);
    assert_eq!(route["current_point_id"], points[0]["id"]);
    assert_eq!(route["polyline"].as_array().unwrap().len(), 3);
    assert!(route["total_distance_km"].as_f64().unwrap() > 0.0);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/packages/{id}/route/points"),
            Some(&token),
            json!({
                "location_name": "Transit hub",
                "location": { "lat": 55.0, "lng": 37.2 },
                "order": 2
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let added = body_json(res).await;
    assert_eq!(added["route"]["points"].as_array().unwrap().len(), 4);
    assert_eq!(added["point"]["order"], 2);

    let origin_id = points[0]["id"].as_str().unwrap();
    let res = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/packages/{id}/route/points/{origin_id}"),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    for expected_order in 1..=3 {
        let res = app
            .clone()
            .oneshot(request(
                "POST",
                &format!("/packages/{id}/route/advance"),
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["advance"]["order"], expected_order);
        assert_eq!(body["advance"]["reached_destination"], expected_order == 3);
    }

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/packages/{id}/route/advance"),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .clone()
        .oneshot(request("GET", &format!("/tracking/{code}"), Some(&token)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let tracking = body_json(res).await;
    assert_eq!(tracking["status"], "delivered");
    assert_eq!(tracking["current_location"], "Example St 1, apt 1");

    let res = app
        .clone()
        .oneshot(request("GET", "/notifications/unread-count", Some(&token)))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["unread"], 3);

    let res = app
        .clone()
        .oneshot(request("POST", "/notifications/read-all", Some(&token)))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["updated"], 3);

    let res = app
        .clone()
        .oneshot(request("GET", "/packages?category=delivered", Some(&token)))
        .await
        .unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 1);

    let res = app
        .clone()
        .oneshot(request("DELETE", &format!("/packages/{id}"), Some(&token)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = app
        .oneshot(request("GET", "/notifications", Some(&token)))
        .await
        .unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn notifications_mark_read_and_delete() {
    let app = setup();
    let token = register(&app, "notes@example.com").await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/notifications",
            Some(&token),
            json!({ "title": "Welcome", "message": "Thanks for signing up" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let note = body_json(res).await;
    let note_id = note["id"].as_str().unwrap();
    assert_eq!(note["read"], false);

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/notifications/{note_id}/read"),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["read"], true);

    let res = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/notifications/{note_id}"),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = app
        .oneshot(request(
            "DELETE",
            &format!("/notifications/{note_id}"),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboard_summarizes_packages_and_notifications() {
    let app = setup();
    let token = register(&app, "dash@example.com").await;

    let kept = create_package(&app, &token, 55.75, 37.61).await;
    let dropped = create_package(&app, &token, 55.76, 37.62).await;
    let dropped_id = dropped["id"].as_str().unwrap();
    let kept_id = kept["id"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/packages/{dropped_id}/cancel"),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/packages/{dropped_id}/route"),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/packages/{dropped_id}/route/advance"),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    app.clone()
        .oneshot(request("GET", &format!("/packages/{kept_id}/route"), Some(&token)))
        .await
        .unwrap();
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/packages/{kept_id}/route/advance"),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(request("GET", "/dashboard", Some(&token)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["active"], 1);
    assert_eq!(body["delivered"], 0);
    assert_eq!(body["cancelled"], 1);
    assert_eq!(body["recent_packages"].as_array().unwrap().len(), 2);
    assert_eq!(body["latest_notifications"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_tracking_code_returns_400() {
    let app = setup();
    let token = register(&app, "track@example.com").await;

    let res = app
        .oneshot(request("GET", "/tracking/not-a-code", Some(&token)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
