use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tronity_adapter_api::{BearerToken, ClientError, TronityClient, TronityClientConfig};
use tronity_core::{Credentials, FieldValue, VehicleId};

const TOKEN: &str = "tok-1";

#[derive(Clone)]
struct Upstream {
    status: StatusCode,
    body: Arc<str>,
}

#[derive(Deserialize)]
struct AuthForm {
    client_id: String,
    client_secret: String,
    grant_type: String,
}

async fn authenticate(Form(form): Form<AuthForm>) -> Response {
    if form.grant_type != "app" {
        return StatusCode::BAD_REQUEST.into_response();
    }
    if form.client_id == "id" && form.client_secret == "secret" {
        (StatusCode::CREATED, Json(json!({"access_token": TOKEN}))).into_response()
    } else if form.client_id == "garbled" {
        (StatusCode::OK, "<html>oops</html>").into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_client"}))).into_response()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

async fn vehicle(Path(id): Path<String>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match id.as_str() {
        "veh-1" => Json(json!({"id": "veh-1", "displayName": "Family Car"})).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn last_record(
    State(upstream): State<Upstream>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match id.as_str() {
        "veh-1" => (upstream.status, upstream.body.to_string()).into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({})).into_response()
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn serve(record: Upstream) -> SocketAddr {
    let app = Router::new()
        .route("/authentication", post(authenticate))
        .route("/vehicles/{id}", get(vehicle))
        .route("/vehicles/{id}/last_record", get(last_record))
        .with_state(record);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

fn client(addr: SocketAddr) -> TronityClient {
    TronityClient::new(TronityClientConfig {
        auth_url: format!("http://{addr}/authentication"),
        vehicles_url: format!("http://{addr}/vehicles"),
        timeout: Duration::from_millis(300),
    })
    .unwrap()
}

fn record(status: StatusCode, body: &str) -> Upstream {
    Upstream {
        status,
        body: Arc::from(body),
    }
}

fn fixture() -> String {
    json!({
        "odometer": 12345,
        "range": 210,
        "level": 87,
        "charging": false,
        "plugged": true,
        "chargerPower": 7.2,
        "chargeRemainingTime": 5400,
        "latitude": 52.1,
        "longitude": 4.3
    })
    .to_string()
}

#[tokio::test]
async fn token_for_valid_credentials() {
    let addr = serve(record(StatusCode::OK, &fixture())).await;
    let token = client(addr)
        .fetch_token(&Credentials::new("id", "secret"))
        .await
        .unwrap();
    assert_eq!(token.value(), TOKEN);
}

#[tokio::test]
async fn token_rejected_for_invalid_credentials() {
    let addr = serve(record(StatusCode::OK, &fixture())).await;
    let err = client(addr)
        .fetch_token(&Credentials::new("id", "wrong"))
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::Auth { status: 401 });
}

#[tokio::test]
async fn unparsable_token_body_is_auth_error() {
    let addr = serve(record(StatusCode::OK, &fixture())).await;
    let err = client(addr)
        .fetch_token(&Credentials::new("garbled", "secret"))
        .await
        .unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn snapshot_decodes_fixture() {
    let addr = serve(record(StatusCode::OK, &fixture())).await;
    let snapshot = client(addr)
        .fetch_snapshot(&BearerToken::new(TOKEN), &VehicleId::new("veh-1"))
        .await
        .unwrap();

    assert_eq!(snapshot.len(), 9);
    assert_eq!(snapshot.get("odometer"), Some(&FieldValue::Integer(12345)));
    assert_eq!(snapshot.get("plugged"), Some(&FieldValue::Bool(true)));
    assert_eq!(snapshot.get("latitude"), Some(&FieldValue::Float(52.1)));
}

#[tokio::test]
async fn snapshot_with_rejected_token() {
    let addr = serve(record(StatusCode::OK, &fixture())).await;
    let err = client(addr)
        .fetch_snapshot(&BearerToken::new("expired"), &VehicleId::new("veh-1"))
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::Auth { status: 401 });
}

#[tokio::test]
async fn snapshot_with_non_json_body() {
    let addr = serve(record(StatusCode::OK, "<html>Bad Gateway</html>")).await;
    let err = client(addr)
        .fetch_snapshot(&BearerToken::new(TOKEN), &VehicleId::new("veh-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
}

#[tokio::test]
async fn snapshot_with_non_object_body() {
    let addr = serve(record(StatusCode::OK, "[1,2,3]")).await;
    let err = client(addr)
        .fetch_snapshot(&BearerToken::new(TOKEN), &VehicleId::new("veh-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
}

#[tokio::test]
async fn snapshot_server_error() {
    let addr = serve(record(StatusCode::BAD_GATEWAY, "upstream down")).await;
    let err = client(addr)
        .fetch_snapshot(&BearerToken::new(TOKEN), &VehicleId::new("veh-1"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ClientError::Api {
            status: 502,
            message: "upstream down".to_string(),
        }
    );
}

#[tokio::test]
async fn snapshot_times_out() {
    let addr = serve(record(StatusCode::OK, &fixture())).await;
    let err = client(addr)
        .fetch_snapshot(&BearerToken::new(TOKEN), &VehicleId::new("slow"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn display_name_lookup() {
    let addr = serve(record(StatusCode::OK, &fixture())).await;
    let name = client(addr)
        .fetch_display_name(&BearerToken::new(TOKEN), &VehicleId::new("veh-1"))
        .await
        .unwrap();
    assert_eq!(name, "Family Car");
}

#[tokio::test]
async fn display_name_unknown_vehicle() {
    let addr = serve(record(StatusCode::OK, &fixture())).await;
    let err = client(addr)
        .fetch_display_name(&BearerToken::new(TOKEN), &VehicleId::new("veh-9"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 404, .. }));
}

#[test]
fn only_rejections_are_auth_errors() {
    assert!(ClientError::Auth { status: 403 }.is_auth());
    assert!(!ClientError::Timeout("30s".into()).is_auth());
    assert!(!ClientError::Decode("eof".into()).is_auth());
}
