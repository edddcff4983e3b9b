use std::sync::Arc;

use super::*;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use shared::domain::Attribute;
use tokio::{net::TcpListener, sync::Mutex};

type Captured = Arc<Mutex<Vec<Value>>>;

async fn spawn_service(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/api")
}

fn client(base_url: &str) -> HttpAccessControlClient {
    HttpAccessControlClient::new(base_url).expect("client")
}

async fn capture(State(captured): State<Captured>, Json(body): Json<Value>) -> Json<Value> {
    captured.lock().await.push(body.clone());
    Json(json!({ "status": "success", "authority_name": body["authority_name"] }))
}

#[test]
fn endpoints_keep_base_path() {
    let client = client("http://localhost:8080/api");
    assert_eq!(
        client.endpoint(Route::Encrypt).as_str(),
        "http://localhost:8080/api/encrypt"
    );
    let client = HttpAccessControlClient::new("http://localhost:8080/api/").expect("client");
    assert_eq!(
        client.endpoint(Route::SetupAuthority).as_str(),
        "http://localhost:8080/api/setup_authority"
    );
}

#[test]
fn rejects_non_http_base_url() {
    assert!(matches!(
        HttpAccessControlClient::new("ftp://localhost/api"),
        Err(ClientConfigError::UnsupportedScheme(scheme)) if scheme == "ftp"
    ));
    assert!(matches!(
        HttpAccessControlClient::new("not a url"),
        Err(ClientConfigError::InvalidUrl { .. })
    ));
}

#[tokio::test]
async fn bootstrap_posts_authority_name() {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/api/setup_authority", post(capture))
        .with_state(Arc::clone(&captured));
    let base_url = spawn_service(app).await;

    client(&base_url)
        .bootstrap_authority(&AuthorityName::from("HOSPITAL"))
        .await
        .expect("bootstrap");

    let bodies = captured.lock().await;
    assert_eq!(bodies.as_slice(), &[json!({ "authority_name": "HOSPITAL" })]);
}

#[tokio::test]
async fn bootstrap_reports_non_success_status() {
    let app = Router::new().route(
        "/api/setup_authority",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "redis unavailable") }),
    );
    let base_url = spawn_service(app).await;

    let err = client(&base_url)
        .bootstrap_authority(&AuthorityName::from("HOSPITAL"))
        .await
        .expect_err("must fail");
    assert_eq!(
        err,
        RemoteError::Service {
            status: 500,
            message: "redis unavailable".to_string()
        }
    );
}

#[tokio::test]
async fn issue_credential_sends_keygen_body_and_returns_key() {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route(
            "/api/keygen",
            post(
                |State(captured): State<Captured>, Json(body): Json<Value>| async move {
                    captured.lock().await.push(body);
                    Json(json!({ "status": "success", "user_key": "00ff" }))
                },
            ),
        )
        .with_state(Arc::clone(&captured));
    let base_url = spawn_service(app).await;

    let ack = client(&base_url)
        .issue_credential(&CredentialRequest {
            authority_name: AuthorityName::from("HOSPITAL"),
            attributes: vec![Attribute::from("doctor")],
            user_id: UserId::from("alice"),
        })
        .await
        .expect("issue");

    assert_eq!(ack.user_key.as_deref(), Some("00ff"));
    let bodies = captured.lock().await;
    assert_eq!(
        bodies.as_slice(),
        &[json!({
            "authority_name": "HOSPITAL",
            "attributes": ["doctor"],
            "user_id": "alice"
        })]
    );
}

#[tokio::test]
async fn issue_credential_accepts_non_json_acknowledgement() {
    let app = Router::new().route("/api/keygen", post(|| async { "ok" }));
    let base_url = spawn_service(app).await;

    let ack = client(&base_url)
        .issue_credential(&CredentialRequest {
            authority_name: AuthorityName::from("HOSPITAL"),
            attributes: vec![Attribute::from("doctor")],
            user_id: UserId::from("alice"),
        })
        .await
        .expect("issue");
    assert_eq!(ack, CredentialAck::default());
}

#[tokio::test]
async fn issue_credential_surfaces_service_message() {
    let app = Router::new().route(
        "/api/keygen",
        post(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Authority secret key for 'CLINIC' not found" })),
            )
        }),
    );
    let base_url = spawn_service(app).await;

    let err = client(&base_url)
        .issue_credential(&CredentialRequest {
            authority_name: AuthorityName::from("CLINIC"),
            attributes: vec![Attribute::from("doctor")],
            user_id: UserId::from("alice"),
        })
        .await
        .expect_err("must fail");
    assert!(!err.is_transport());
    assert_eq!(err.detail(), "Authority secret key for 'CLINIC' not found");
}

#[tokio::test]
async fn encrypt_returns_ciphertext() {
    let app = Router::new().route(
        "/api/encrypt",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["policy"], "DOCTOR@HOSPITAL");
            assert_eq!(body["payload"], "patient record");
            Json(json!({ "result": "abcd:ef01" }))
        }),
    );
    let base_url = spawn_service(app).await;

    let ciphertext = client(&base_url)
        .encrypt("DOCTOR@HOSPITAL", "patient record")
        .await
        .expect("encrypt");
    assert_eq!(ciphertext, Ciphertext::from("abcd:ef01"));
}

#[tokio::test]
async fn encrypt_embedded_error_is_service_level_failure() {
    let app = Router::new().route(
        "/api/encrypt",
        post(|| async { Json(json!({ "error": "malformed policy" })) }),
    );
    let base_url = spawn_service(app).await;

    let err = client(&base_url)
        .encrypt("DOCTOR@@", "patient record")
        .await
        .expect_err("must fail");
    assert_eq!(err, RemoteError::Embedded("malformed policy".to_string()));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn encrypt_non_success_status_uses_error_field() {
    let app = Router::new().route(
        "/api/encrypt",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Encryption failed: unknown authority" })),
            )
        }),
    );
    let base_url = spawn_service(app).await;

    let err = client(&base_url)
        .encrypt("DOCTOR@CLINIC", "patient record")
        .await
        .expect_err("must fail");
    assert_eq!(
        err,
        RemoteError::Service {
            status: 500,
            message: "Encryption failed: unknown authority".to_string()
        }
    );
}

#[tokio::test]
async fn encrypt_success_without_result_is_malformed() {
    let app = Router::new().route("/api/encrypt", post(|| async { Json(json!({})) }));
    let base_url = spawn_service(app).await;

    let err = client(&base_url)
        .encrypt("DOCTOR@HOSPITAL", "patient record")
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        RemoteError::MalformedResponse { route: "encrypt", .. }
    ));
}

#[tokio::test]
async fn decrypt_returns_plaintext() {
    let app = Router::new().route(
        "/api/decrypt",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["user_id"], "alice");
            assert_eq!(body["payload"], "abcd:ef01");
            Json(json!({ "decrypted_message": "patient record" }))
        }),
    );
    let base_url = spawn_service(app).await;

    let plaintext = client(&base_url)
        .decrypt(&UserId::from("alice"), &Ciphertext::from("abcd:ef01"))
        .await
        .expect("decrypt");
    assert_eq!(plaintext, "patient record");
}

#[tokio::test]
async fn decrypt_non_success_status_is_access_denial() {
    let app = Router::new().route(
        "/api/decrypt",
        post(|| async {
            (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Decryption failed: Policy not satisfied or invalid key." })),
            )
        }),
    );
    let base_url = spawn_service(app).await;

    let err = client(&base_url)
        .decrypt(&UserId::from("bob"), &Ciphertext::from("abcd:ef01"))
        .await
        .expect_err("must fail");
    assert!(err.is_access_denied());
    assert_eq!(
        err,
        RemoteError::AccessDenied {
            status: 403,
            message: "Decryption failed: Policy not satisfied or invalid key.".to_string()
        }
    );
}

#[tokio::test]
async fn unreachable_service_is_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = client(&format!("http://{addr}/api"))
        .decrypt(&UserId::from("alice"), &Ciphertext::from("abcd:ef01"))
        .await
        .expect_err("must fail");
    assert!(err.is_transport());
    assert!(!err.is_access_denied());
}

#[tokio::test]
async fn slow_service_times_out_as_transport_failure() {
    let app = Router::new().route(
        "/api/setup_authority",
        post(|| async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            "late"
        }),
    );
    let base_url = spawn_service(app).await;
    let client = HttpAccessControlClient::with_timeout(
        &base_url,
        Some(std::time::Duration::from_millis(100)),
    )
    .expect("client");

    let err = client
        .bootstrap_authority(&AuthorityName::from("HOSPITAL"))
        .await
        .expect_err("must time out");
    assert!(err.is_transport());
    assert!(err.detail().contains("timed out"), "unexpected: {err}");
}
