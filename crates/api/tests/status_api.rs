//! Integration tests for status polling, artifact links and signed downloads.

mod common;

use analysis_db::models::job::JobUpdate;
use analysis_db::JobStore;
use axum::http::StatusCode;
use common::{
    body_bytes, body_json, build_test_app, get, get_with_credential, submit, TestApp,
    PUBLIC_BASE_URL, TEST_SECRET,
};
use serde_json::json;
use uuid::Uuid;

const CSV: &[u8] = b"region,visits\nnorth,12\nsouth,30\n";

async fn submit_job(t: &TestApp) -> (Uuid, String) {
    let json = body_json(submit(t.app(), "poisson_factorization", CSV).await).await;
    let job_id = json["data"]["jobId"].as_str().unwrap().parse().unwrap();
    let path = json["data"]["path"].as_str().unwrap().to_string();
    (job_id, path)
}

/// Turn an absolute signed link into a request URI for the router.
fn local_uri(url: &str) -> String {
    url.strip_prefix(PUBLIC_BASE_URL)
        .expect("link should use the public base URL")
        .to_string()
}

// ---------------------------------------------------------------------------
// Test: status polling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_job_returns_404() {
    let t = build_test_app();
    let response = get(t.app(), &format!("/api/v1/jobs/{}", Uuid::now_v7())).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn malformed_job_id_is_rejected() {
    let t = build_test_app();
    let response = get(t.app(), "/api/v1/jobs/not-a-uuid").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pending_job_reports_status_only() {
    let t = build_test_app();
    let (job_id, _) = submit_job(&t).await;

    let response = get(t.app(), &format!("/api/v1/jobs/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["jobId"], job_id.to_string());
    assert_eq!(json["status"], "pending");
    assert!(json.get("result").is_none());
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn repeated_reads_are_identical() {
    let t = build_test_app();
    let (job_id, _) = submit_job(&t).await;
    let uri = format!("/api/v1/jobs/{job_id}");

    let first = body_json(get(t.app(), &uri).await).await;
    let second = body_json(get(t.app(), &uri).await).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn failed_job_reports_error_message() {
    let t = build_test_app();
    let (job_id, _) = submit_job(&t).await;
    t.store.update(job_id, &JobUpdate::running()).await.unwrap();
    t.store
        .update(job_id, &JobUpdate::error("CSV header row is empty"))
        .await
        .unwrap();

    let json = body_json(get(t.app(), &format!("/api/v1/jobs/{job_id}")).await).await;
    assert_eq!(json["status"], "error");
    assert_eq!(json["error"], "CSV header row is empty");
    assert!(json.get("result").is_none());
}

#[tokio::test]
async fn running_job_reports_progress() {
    let t = build_test_app();
    let (job_id, _) = submit_job(&t).await;
    t.store.update(job_id, &JobUpdate::running()).await.unwrap();
    t.store.update(job_id, &JobUpdate::progress(40)).await.unwrap();

    let json = body_json(get(t.app(), &format!("/api/v1/jobs/{job_id}")).await).await;
    assert_eq!(json["status"], "running");
    assert_eq!(json["progress"], 40);
}

#[tokio::test]
async fn done_job_reports_result() {
    let t = build_test_app();
    let (job_id, _) = submit_job(&t).await;
    t.store.update(job_id, &JobUpdate::running()).await.unwrap();
    t.store
        .update(job_id, &JobUpdate::done(json!({ "factors": 3 })))
        .await
        .unwrap();

    let json = body_json(get(t.app(), &format!("/api/v1/jobs/{job_id}")).await).await;
    assert_eq!(json["status"], "done");
    assert_eq!(json["result"], json!({ "factors": 3 }));
}

// ---------------------------------------------------------------------------
// Test: signed artifact links
// ---------------------------------------------------------------------------

#[tokio::test]
async fn artifact_link_downloads_the_upload() {
    let t = build_test_app();
    let (job_id, path) = submit_job(&t).await;

    let response = get_with_credential(
        t.app(),
        &format!("/api/v1/jobs/{job_id}/artifact-url?ttl_secs=120"),
        Some(TEST_SECRET),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["expiresInSecs"], 120);
    let url = json["data"]["url"].as_str().unwrap().to_string();
    assert!(url.starts_with(&format!("{PUBLIC_BASE_URL}/files/{path}?")));

    let response = get(t.app(), &local_uri(&url)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/csv");
    assert_eq!(body_bytes(response).await, CSV);
}

#[tokio::test]
async fn artifact_link_requires_credential() {
    let t = build_test_app();
    let (job_id, _) = submit_job(&t).await;

    let response = get(t.app(), &format!("/api/v1/jobs/{job_id}/artifact-url")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tampered_link_returns_403() {
    let t = build_test_app();
    let (job_id, _) = submit_job(&t).await;

    let json = body_json(
        get_with_credential(
            t.app(),
            &format!("/api/v1/jobs/{job_id}/artifact-url"),
            Some(TEST_SECRET),
        )
        .await,
    )
    .await;
    let uri = local_uri(json["data"]["url"].as_str().unwrap());

    let (base, signature) = uri.split_once("signature=").unwrap();
    let flipped = if signature.starts_with('0') { "1" } else { "0" };
    let tampered = format!("{base}signature={flipped}{}", &signature[1..]);

    let response = get(t.app(), &tampered).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "FORBIDDEN");
}

#[tokio::test]
async fn expired_link_returns_403() {
    let t = build_test_app();
    let (_, path) = submit_job(&t).await;

    let signer = common::test_config().storage.link_signer();
    let url = signer.url_expiring_at(&path, chrono::Utc::now().timestamp() - 10);

    let response = get(t.app(), &local_uri(&url)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn cleared_artifact_has_no_link() {
    let t = build_test_app();
    let (job_id, _) = submit_job(&t).await;
    t.store.update(job_id, &JobUpdate::running()).await.unwrap();
    t.store
        .update(job_id, &JobUpdate::done(json!({})))
        .await
        .unwrap();
    t.store
        .update(job_id, &JobUpdate::clear_input_file())
        .await
        .unwrap();

    let response = get_with_credential(
        t.app(),
        &format!("/api/v1/jobs/{job_id}/artifact-url"),
        Some(TEST_SECRET),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_store_and_storage() {
    let t = build_test_app();
    let response = get(t.app(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store_healthy"], true);
    assert_eq!(json["storage_backend"], "memory");
}
