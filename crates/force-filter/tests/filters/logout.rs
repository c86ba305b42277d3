use std::sync::Arc;

use axum::http::{Method, StatusCode};
use force_filter::force_auth::{
    cookies, RequestOrigin, SecurityContext, SecurityContextHolder, StorageMethod,
};
use force_filter::{LogoutFilter, LogoutFilterConfig};
use tower::ServiceExt;
use url::Url;

use crate::common::*;

const SUCCESS_URL: &str = "/goodbye";

fn local_only() -> LogoutFilterConfig {
    LogoutFilterConfig::default()
        .with_logout_from_force_dot_com(false)
        .with_logout_success_url(SUCCESS_URL)
}

fn ret_url(location: &str) -> String {
    let url = Url::parse(location).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "retUrl")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

#[tokio::test]
async fn test_no_context_redirects_without_remote_call() {
    let backend = TestBackend::new();
    let filter = LogoutFilter::new(local_only(), services(backend.clone()));

    let response = filter.do_filter(&request_headers(None)).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), SUCCESS_URL);
    assert_eq!(backend.logout_calls(), 0);
    assert!(!cookies::is_expired_in(response.headers(), "sid"));
}

#[tokio::test]
async fn test_no_context_still_expires_provider_cookies() {
    let backend = TestBackend::new();
    let config = LogoutFilterConfig::default().with_logout_success_url(SUCCESS_URL);
    let filter = LogoutFilter::new(config, services(backend.clone()));

    let response = filter.do_filter(&request_headers(Some("sid=abc"))).await;

    assert_eq!(location(&response), SUCCESS_URL);
    assert_eq!(backend.logout_calls(), 0);
    for name in cookies::PROVIDER_COOKIES {
        assert!(cookies::is_expired_in(response.headers(), name), "{} not expired", name);
    }
}

#[tokio::test]
async fn test_cookie_storage_logout_clears_cookies() {
    let backend = TestBackend::new();
    let services = services(backend.clone());
    let cookie = stored_cookies(&services, StorageMethod::Cookie, &context());
    services.cache().put(&context());
    let filter = LogoutFilter::new(local_only(), services.clone());

    let response = filter.do_filter(&request_headers(Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), SUCCESS_URL);
    assert_eq!(backend.logout_calls(), 1);
    assert_eq!(backend.revoked_sessions(), vec![SESSION_ID.to_string()]);

    for name in [cookies::SECURITY_CONTEXT, cookies::FORCE_SID, cookies::FORCE_EP] {
        assert!(cookies::is_expired_in(response.headers(), name), "{} not expired", name);
    }
    // Provider session is left alone when only logging out locally.
    assert!(!cookies::is_expired_in(response.headers(), "sid"));
    assert!(services.cache().get(USER_ID).is_none());
}

#[tokio::test]
async fn test_session_storage_logout_keeps_security_context_cookie() {
    let backend = TestBackend::new();
    let services = services(backend.clone());
    let cookie = stored_cookies(&services, StorageMethod::Session, &context());
    let cookie = format!("{}; {}=stale", cookie, cookies::SECURITY_CONTEXT);
    let storage = services.storage(StorageMethod::Session);
    assert!(storage.load(&request_headers(Some(&cookie))).unwrap().is_some());

    let filter = LogoutFilter::new(
        local_only().with_storage_method(StorageMethod::Session),
        services.clone(),
    );
    let response = filter.do_filter(&request_headers(Some(&cookie))).await;

    assert_eq!(location(&response), SUCCESS_URL);
    assert_eq!(backend.logout_calls(), 1);
    assert!(!cookies::is_expired_in(response.headers(), cookies::SECURITY_CONTEXT));
    assert!(cookies::is_expired_in(response.headers(), cookies::SESSION_ID));
    assert!(storage.load(&request_headers(Some(&cookie))).unwrap().is_none());
}

#[tokio::test]
async fn test_logout_from_provider_redirects_through_logout_page() {
    let backend = TestBackend::new();
    let services = services(backend.clone());
    let cookie = stored_cookies(&services, StorageMethod::Cookie, &context());
    let config = LogoutFilterConfig::default().with_logout_success_url(SUCCESS_URL);
    let filter = LogoutFilter::new(config, services);

    let response = filter.do_filter(&request_headers(Some(&cookie))).await;

    let location = location(&response);
    assert!(
        location.starts_with("https://na1.salesforce.com/secur/logout.jsp?retUrl="),
        "unexpected location {}",
        location
    );
    assert_eq!(ret_url(location), "https://app.example.com/goodbye");
    assert_eq!(backend.logout_calls(), 1);
    for name in cookies::PROVIDER_COOKIES {
        assert!(cookies::is_expired_in(response.headers(), name), "{} not expired", name);
    }
}

#[tokio::test]
async fn test_forwarded_host_needs_trusted_proxy() {
    let config = LogoutFilterConfig::default().with_logout_success_url(SUCCESS_URL);

    let services = services(TestBackend::new());
    let cookie = stored_cookies(&services, StorageMethod::Cookie, &context());
    let filter = LogoutFilter::new(config.clone(), services);
    let response = filter.do_filter(&forwarded_headers(Some(&cookie))).await;
    assert_eq!(ret_url(location(&response)), "https://app.example.com/goodbye");

    let trusted = Arc::new(base_services(TestBackend::new()).with_trusted_proxy(true));
    let filter = LogoutFilter::new(config.clone(), trusted);
    let response = filter.do_filter(&forwarded_headers(Some(&cookie))).await;
    assert_eq!(ret_url(location(&response)), "http://evil.example.net/goodbye");

    let pinned = Arc::new(
        base_services(TestBackend::new())
            .with_trusted_proxy(true)
            .with_public_origin(RequestOrigin::new("https", "crm.example.com")),
    );
    let filter = LogoutFilter::new(config, pinned);
    let response = filter.do_filter(&forwarded_headers(Some(&cookie))).await;
    assert_eq!(ret_url(location(&response)), "https://crm.example.com/goodbye");
}

#[tokio::test]
async fn test_absolute_success_url_is_embedded_unchanged() {
    let backend = TestBackend::new();
    let services = services(backend);
    let cookie = stored_cookies(&services, StorageMethod::Cookie, &context());
    let config = LogoutFilterConfig::default()
        .with_logout_success_url("https://www.example.org/signed-out?from=app");
    let filter = LogoutFilter::new(config, services);

    let response = filter.do_filter(&request_headers(Some(&cookie))).await;

    assert_eq!(
        ret_url(location(&response)),
        "https://www.example.org/signed-out?from=app"
    );
}

#[tokio::test]
async fn test_remote_failure_still_clears_local_state() {
    for outcome in [LogoutOutcome::Unreachable, LogoutOutcome::Rejected] {
        let backend = TestBackend::with_outcome(outcome);
        let services = services(backend.clone());
        let cookie = stored_cookies(&services, StorageMethod::Cookie, &context());
        services.cache().put(&context());
        let filter = LogoutFilter::new(local_only(), services.clone());

        let response = filter.do_filter(&request_headers(Some(&cookie))).await;

        assert_eq!(response.status(), StatusCode::FOUND, "{:?}", outcome);
        assert_eq!(location(&response), SUCCESS_URL);
        assert_eq!(backend.logout_calls(), 1);
        assert!(cookies::is_expired_in(response.headers(), cookies::SECURITY_CONTEXT));
        assert!(cookies::is_expired_in(response.headers(), cookies::FORCE_SID));
        assert!(services.cache().get(USER_ID).is_none());
    }
}

#[tokio::test]
async fn test_context_without_session_skips_remote_call() {
    let backend = TestBackend::new();
    let services = services(backend.clone());
    let context = SecurityContext::new("", Url::parse(ENDPOINT).unwrap()).with_user_id(USER_ID);
    let cookie = stored_cookies(&services, StorageMethod::Cookie, &context);
    let filter = LogoutFilter::new(local_only(), services);

    let response = filter.do_filter(&request_headers(Some(&cookie))).await;

    assert_eq!(backend.logout_calls(), 0);
    assert_eq!(location(&response), SUCCESS_URL);
    assert!(cookies::is_expired_in(response.headers(), cookies::SECURITY_CONTEXT));
}

#[tokio::test]
async fn test_unreadable_context_is_cleared() {
    let backend = TestBackend::new();
    let filter = LogoutFilter::new(local_only(), services(backend.clone()));
    let cookie = format!("{}=not-a-sealed-context", cookies::SECURITY_CONTEXT);

    let response = filter.do_filter(&request_headers(Some(&cookie))).await;

    assert_eq!(backend.logout_calls(), 0);
    assert_eq!(location(&response), SUCCESS_URL);
    assert!(cookies::is_expired_in(response.headers(), cookies::SECURITY_CONTEXT));
}

#[tokio::test]
async fn test_holder_context_is_used_and_released() {
    let backend = TestBackend::new();
    let filter = LogoutFilter::new(local_only(), services(backend.clone()));

    let (response, remaining) = SecurityContextHolder::scope(Some(context()), async {
        let response = filter.do_filter(&request_headers(None)).await;
        (response, SecurityContextHolder::get())
    })
    .await;

    assert_eq!(location(&response), SUCCESS_URL);
    assert_eq!(backend.revoked_sessions(), vec![SESSION_ID.to_string()]);
    assert!(remaining.is_none());
}

#[tokio::test]
async fn test_router_serves_get_and_post() {
    let backend = TestBackend::new();
    let services = services(backend.clone());
    let cookie = stored_cookies(&services, StorageMethod::Cookie, &context());

    for method in [Method::GET, Method::POST] {
        let app = LogoutFilter::new(local_only(), services.clone()).into_router("/logout");
        let response = app
            .oneshot(request(method.clone(), "/logout", Some(&cookie)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND, "{}", method);
        assert_eq!(location(&response), SUCCESS_URL);
    }
    assert_eq!(backend.logout_calls(), 2);
}

#[tokio::test]
async fn test_repeated_logout_is_harmless() {
    let backend = TestBackend::new();
    let services = services(backend.clone());
    let cookie = stored_cookies(&services, StorageMethod::Session, &context());
    let filter = LogoutFilter::new(
        local_only().with_storage_method(StorageMethod::Session),
        services,
    );

    let first = filter.do_filter(&request_headers(Some(&cookie))).await;
    let second = filter.do_filter(&request_headers(Some(&cookie))).await;

    assert_eq!(location(&first), SUCCESS_URL);
    assert_eq!(location(&second), SUCCESS_URL);
    assert_eq!(backend.logout_calls(), 1);
}
