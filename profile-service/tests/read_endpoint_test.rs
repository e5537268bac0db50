mod common;

use common::{TestApp, encrypted, location, user};
use profile_service::models::UserRecord;
use service_core::axum::http::StatusCode;

const REQUESTED_BY: &str = "x-authenticated-userid";

#[tokio::test]
async fn test_read_returns_envelope() {
    let app = TestApp::new();
    app.store.insert_user(user("u1"));

    let response = app
        .send(
            "/user/v4/read/u1",
            &[(REQUESTED_BY, "u1"), ("x-request-id", "req-123")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-123");

    let (status, body) = app
        .get("/user/v4/read/u1", &[("x-request-id", "req-123")])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "api.user.read");
    assert_eq!(body["ver"], "v4");
    assert_eq!(body["params"]["status"], "successful");
    assert_eq!(body["params"]["resmsgid"], "req-123");
    assert!(body["ts"].is_string());
    assert_eq!(body["result"]["response"]["identifier"], "u1");
    assert_eq!(body["result"]["response"]["userName"], "u1_name");
}

#[tokio::test]
async fn test_legacy_route_adds_default_block() {
    let app = TestApp::new();
    app.store.insert_user(user("u1"));

    let (status, body) = app.get("/user/v3/read/u1", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ver"], "v3");
    let profile = &body["result"]["response"];
    assert_eq!(profile["countryCode"], "+91");
    assert!(profile.get("userType").is_some());

    let (_, body) = app.get("/user/v4/read/u1", &[]).await;
    assert!(body["result"]["response"].get("countryCode").is_none());
}

#[tokio::test]
async fn test_fatal_errors_carry_stable_codes() {
    let app = TestApp::new();
    app.store.insert_user(UserRecord {
        is_deleted: Some(true),
        ..user("gone")
    });
    app.store.insert_user(UserRecord {
        managed_by: Some("parent".to_string()),
        ..user("child")
    });

    let cases = [
        ("/user/v4/read/nobody", StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
        ("/user/v4/read/gone", StatusCode::BAD_REQUEST, "USER_ACCOUNT_LOCKED"),
        (
            "/user/v4/read/ext-1?provider=org-x",
            StatusCode::BAD_REQUEST,
            "MANDATORY_PARAMETER_MISSING",
        ),
        (
            "/user/v4/read/ext-1?provider=org-x&idType=teacher-id",
            StatusCode::NOT_FOUND,
            "EXTERNAL_ID_NOT_FOUND",
        ),
        ("/user/v4/read/child", StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
    ];

    for (uri, expected_status, expected_code) in cases {
        let (status, body) = app.get(uri, &[(REQUESTED_BY, "stranger")]).await;
        assert_eq!(status, expected_status, "{}", uri);
        assert_eq!(body["code"], expected_code, "{}", uri);
        assert!(body["error"].is_string(), "{}", uri);
    }
}

#[tokio::test]
async fn test_private_route_relaxes_delegation_and_exposes_ciphertext() {
    let app = TestApp::new();
    let cipher = encrypted("asha@example.org");
    app.store.insert_user(UserRecord {
        managed_by: Some("parent".to_string()),
        email: Some(cipher.clone()),
        ..user("child")
    });

    let (status, body) = app
        .get("/private/user/v4/read/child", &[(REQUESTED_BY, "stranger")])
        .await;
    assert_eq!(status, StatusCode::OK);
    let profile = &body["result"]["response"];
    assert_eq!(profile["email"], "asha@example.org");
    assert_eq!(profile["encEmail"], cipher.as_str());

    let (status, _) = app
        .get("/private/user/v3/read/child", &[(REQUESTED_BY, "stranger")])
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_owner_gets_managed_token_from_headers() {
    let app = TestApp::new();
    app.store.insert_user(UserRecord {
        managed_by: Some("parent".to_string()),
        ..user("child")
    });

    let (status, body) = app
        .get(
            "/user/v4/read/child?withTokens=true",
            &[(REQUESTED_BY, "parent")],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["result"]["response"]["managedToken"],
        "managed:parent:child"
    );

    let (_, body) = app
        .get(
            "/user/v4/read/child?withTokens=true",
            &[(REQUESTED_BY, "parent"), ("x-authenticated-for", "held-token")],
        )
        .await;
    assert_eq!(body["result"]["response"]["managedToken"], "held-token");
}

#[tokio::test]
async fn test_with_tokens_is_case_insensitive() {
    let app = TestApp::new();
    app.store.insert_user(UserRecord {
        managed_by: Some("parent".to_string()),
        ..user("child")
    });

    let (status, body) = app
        .get(
            "/user/v4/read/child?withTokens=TRUE",
            &[(REQUESTED_BY, "parent")],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["result"]["response"]["managedToken"],
        "managed:parent:child"
    );

    let (status, body) = app
        .get(
            "/user/v4/read/child?withTokens=yes",
            &[(REQUESTED_BY, "parent")],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["result"]["response"].get("managedToken").is_none());
}

#[tokio::test]
async fn test_fields_query_selects_sections() {
    let app = TestApp::new();
    app.store.insert_user(UserRecord {
        profile_location: Some(r#"[{"id":"loc1"}]"#.to_string()),
        ..user("u1")
    });
    app.store.insert_location(location("loc1", "state", "TN"));

    let (status, body) = app
        .get("/user/v4/read/u1?fields=locations,topics", &[])
        .await;
    assert_eq!(status, StatusCode::OK);
    let profile = &body["result"]["response"];
    assert_eq!(profile["userLocations"][0]["code"], "TN");
    assert_eq!(profile["topics"], serde_json::json!([]));
    assert!(profile.get("profileLocation").is_none());
    assert!(profile.get("lastLoginTime").is_none());
}

#[tokio::test]
async fn test_metrics_use_route_templates() {
    profile_service::services::metrics::init_metrics().unwrap();
    let app = TestApp::new();
    app.store.insert_user(user("u1"));

    let (status, _) = app.get("/user/v4/read/u1", &[]).await;
    assert_eq!(status, StatusCode::OK);

    let (status, text) = app.get_text("/metrics", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("http_requests_total"));
    assert!(text.contains("/user/v4/read/:user_id"));
    assert!(!text.contains("/user/v4/read/u1"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new();
    let (status, _) = app.get("/user/v5/read/u1", &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
