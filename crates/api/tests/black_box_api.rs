use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use netops_auth::{JwtClaims, Role};
use netops_core::{TenantId, UserId};
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    _runtime: netops_api::app::AppRuntime,
    _dirs: tempfile::TempDir,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        let dirs = tempfile::tempdir().expect("tempdir");
        let config = netops_api::config::ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            jwt_secret: jwt_secret.to_string(),
            encryption_secret: "test-encryption-secret".into(),
            transcript_dir: dirs.path().join("transcripts"),
            manifest_path: dirs.path().join("router.db"),
            scheduler: netops_api::config::SchedulerConfig {
                snmp_poll_interval: std::time::Duration::from_secs(3600),
                backup_sync_interval: std::time::Duration::from_secs(3600),
                pending_refresh_interval: std::time::Duration::from_secs(3600),
                inventory_sync_interval: None,
            },
        };

        let (app, runtime) = netops_api::app::build_app(&config);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            handle,
            _runtime: runtime,
            _dirs: dirs,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, tenant_id: Option<TenantId>, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        tenant_id,
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn get_job_eventually(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    queue: &str,
    id: &str,
) -> serde_json::Value {
    for _ in 0..100 {
        let res = client
            .get(format!("{}/queues/{}/jobs/{}", base_url, queue, id))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            if body["state"] == "completed" || body["state"] == "failed" {
                return body;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("job did not reach a terminal state within timeout");
}

#[tokio::test]
async fn health_is_open_but_jobs_are_not() {
    let server = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!(
            "{}/queues/connectivity-test/jobs",
            server.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn connectivity_test_job_runs_end_to_end() {
    let server = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = mint_jwt("test-secret", Some(TenantId::new()), vec![Role::Operator]);

    // A listener the job can actually reach.
    let target = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = target.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let _ = target.accept().await;
        }
    });

    let res = client
        .post(format!(
            "{}/queues/connectivity-test/jobs",
            server.base_url
        ))
        .bearer_auth(&token)
        .json(&json!({
            "kind": "connectivity-test",
            "device_id": null,
            "host": "127.0.0.1",
            "port": port,
            "timeout_ms": 2000,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let body: serde_json::Value = res.json().await.unwrap();
    let job_id = body["job_id"].as_str().unwrap().to_string();
    assert_eq!(body["queue"], "connectivity-test");

    let job = get_job_eventually(
        &client,
        &server.base_url,
        &token,
        "connectivity-test",
        &job_id,
    )
    .await;
    assert_eq!(job["state"], "completed");
    assert!(job["result"]["latency_ms"].is_number());
}

#[tokio::test]
async fn viewers_cannot_enqueue() {
    let server = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = mint_jwt("test-secret", Some(TenantId::new()), vec![Role::Viewer]);

    let res = client
        .post(format!(
            "{}/queues/connectivity-test/jobs",
            server.base_url
        ))
        .bearer_auth(&token)
        .json(&json!({
            "kind": "connectivity-test",
            "device_id": null,
            "host": "127.0.0.1",
            "port": 9,
            "timeout_ms": 100,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn payload_must_match_the_queue_in_the_path() {
    let server = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = mint_jwt("test-secret", Some(TenantId::new()), vec![Role::Operator]);

    let res = client
        .post(format!("{}/queues/backup-sync/jobs", server.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "kind": "connectivity-test",
            "device_id": null,
            "host": "127.0.0.1",
            "port": 9,
            "timeout_ms": 100,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_for_unknown_device_is_not_found() {
    let server = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = mint_jwt("test-secret", Some(TenantId::new()), vec![Role::Operator]);

    let res = client
        .post(format!("{}/sessions", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "device_id": uuid::Uuid::now_v7() }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
