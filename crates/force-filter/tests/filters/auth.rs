use std::sync::Arc;

use axum::http::header::SET_COOKIE;
use axum::http::{Method, StatusCode};
use axum::routing::get;
use axum::Router;
use force_filter::force_auth::{cookies, SecurityContextHolder, StorageMethod};
use force_filter::{AuthFilterConfig, AuthLayer, ForceContext, ForceServices};
use tower::ServiceExt;

use crate::common::*;

async fn home(ForceContext(context): ForceContext) -> String {
    context.user_name().to_string()
}

async fn whoami() -> String {
    SecurityContextHolder::get()
        .map(|context| context.user_id().to_string())
        .unwrap_or_default()
}

fn app(config: AuthFilterConfig, services: Arc<ForceServices>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/whoami", get(whoami))
        .route("/logout", get(|| async { "logout" }))
        .layer(AuthLayer::new(config, services))
}

fn callback_uri(code: &str, state: &str) -> String {
    format!(
        "/_auth?code={}&state={}",
        urlencoding::encode(code),
        urlencoding::encode(state)
    )
}

#[tokio::test]
async fn test_anonymous_request_redirects_to_provider() {
    let app = app(AuthFilterConfig::default(), services(TestBackend::new()));

    let response = app
        .oneshot(request(Method::GET, "/whoami", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = location(&response);
    assert!(location.starts_with("https://login.salesforce.com/services/oauth2/authorize?"));
    assert!(location.contains("client_id=test-consumer-key"));
    assert!(location.contains("redirect_uri=https%3A%2F%2Fapp.example.com%2F_auth"));
    assert!(location.contains("state=%2Fwhoami"));
}

#[tokio::test]
async fn test_redirect_uri_ignores_untrusted_forwarded_host() {
    let mut forged = request(Method::GET, "/whoami", None);
    *forged.headers_mut() = forwarded_headers(None);
    let router = app(AuthFilterConfig::default(), services(TestBackend::new()));
    let response = router.oneshot(forged).await.unwrap();
    assert!(location(&response).contains("redirect_uri=https%3A%2F%2Fapp.example.com%2F_auth"));

    let mut forged = request(Method::GET, "/whoami", None);
    *forged.headers_mut() = forwarded_headers(None);
    let trusted = Arc::new(base_services(TestBackend::new()).with_trusted_proxy(true));
    let response = app(AuthFilterConfig::default(), trusted)
        .oneshot(forged)
        .await
        .unwrap();
    assert!(location(&response).contains("redirect_uri=http%3A%2F%2Fevil.example.net%2F_auth"));
}

#[tokio::test]
async fn test_callback_stores_context_and_redirects() {
    let backend = TestBackend::new();
    let services = services(backend.clone());
    let app = app(AuthFilterConfig::default(), services.clone());

    let response = app
        .oneshot(request(Method::GET, &callback_uri(VALID_CODE, "/whoami"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/whoami");
    assert_eq!(backend.exchange_calls(), 1);
    assert!(cookies::set_value_in(response.headers(), cookies::SECURITY_CONTEXT).is_some());
    assert_eq!(
        cookies::set_value_in(response.headers(), cookies::FORCE_SID),
        Some(SESSION_ID)
    );
    assert_eq!(
        cookies::set_value_in(response.headers(), cookies::FORCE_EP),
        Some(ENDPOINT)
    );
    assert!(services.cache().get(USER_ID).is_some());
}

#[tokio::test]
async fn test_callback_rejects_foreign_state() {
    let app = app(AuthFilterConfig::default(), services(TestBackend::new()));

    let response = app
        .oneshot(request(Method::GET, &callback_uri(VALID_CODE, "//evil.example.com/"), None))
        .await
        .unwrap();

    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_callback_failures() {
    let backend = TestBackend::new();
    let services = services(backend.clone());

    let denied = app(AuthFilterConfig::default(), services.clone())
        .oneshot(request(Method::GET, "/_auth?error=access_denied", None))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let missing = app(AuthFilterConfig::default(), services.clone())
        .oneshot(request(Method::GET, "/_auth", None))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let bad_code = app(AuthFilterConfig::default(), services.clone())
        .oneshot(request(Method::GET, &callback_uri("expired", "/"), None))
        .await
        .unwrap();
    assert_eq!(bad_code.status(), StatusCode::UNAUTHORIZED);
    assert!(bad_code.headers().get(SET_COOKIE).is_none());

    assert_eq!(backend.exchange_calls(), 1);
    assert!(services.cache().is_empty());
}

#[tokio::test]
async fn test_login_round_trip() {
    for method in [StorageMethod::Cookie, StorageMethod::Session] {
        let services = services(TestBackend::new());
        let config = AuthFilterConfig::default().with_storage_method(method);

        let callback = app(config.clone(), services.clone())
            .oneshot(request(Method::GET, &callback_uri(VALID_CODE, "/"), None))
            .await
            .unwrap();
        let cookie = echo_cookies(callback.headers());

        let home = app(config.clone(), services.clone())
            .oneshot(request(Method::GET, "/", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(home.status(), StatusCode::OK, "{}", method);
        assert_eq!(body_text(home).await, USER_NAME);

        let whoami = app(config, services.clone())
            .oneshot(request(Method::GET, "/whoami", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(body_text(whoami).await, USER_ID);
    }
}

#[tokio::test]
async fn test_unreadable_context_restarts_login() {
    let app = app(AuthFilterConfig::default(), services(TestBackend::new()));
    let cookie = format!("{}=tampered", cookies::SECURITY_CONTEXT);

    let response = app
        .oneshot(request(Method::GET, "/", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with("https://login.salesforce.com/services/oauth2/authorize?"));
    assert!(cookies::is_expired_in(response.headers(), cookies::SECURITY_CONTEXT));
}

#[tokio::test]
async fn test_excluded_path_passes_through() {
    let app = app(AuthFilterConfig::default(), services(TestBackend::new()));

    let response = app
        .oneshot(request(Method::GET, "/logout", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "logout");
}

#[tokio::test]
async fn test_extractor_rejects_without_layer() {
    let app: Router = Router::new().route("/", get(home));

    let response = app
        .oneshot(request(Method::GET, "/", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_issues_fresh_server_session() {
    let services = services(TestBackend::new());
    let config = AuthFilterConfig::default().with_storage_method(StorageMethod::Session);
    let planted = format!("{}=planted-by-someone-else", cookies::SESSION_ID);

    let callback = app(config.clone(), services.clone())
        .oneshot(request(Method::GET, &callback_uri(VALID_CODE, "/"), Some(&planted)))
        .await
        .unwrap();
    let issued = cookies::set_value_in(callback.headers(), cookies::SESSION_ID).unwrap();
    assert_ne!(issued, "planted-by-someone-else");

    let replay = app(config, services)
        .oneshot(request(Method::GET, "/whoami", Some(&planted)))
        .await
        .unwrap();
    assert_eq!(replay.status(), StatusCode::FOUND);
}
