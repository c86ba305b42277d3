use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{COOKIE, HOST, LOCATION};
use axum::http::{HeaderMap, HeaderValue, Method, Request};
use axum::response::Response;
use force_filter::force_auth::{
    cookies, ConnectorConfig, ContextCipher, Error, ErrorKind, IdentityBackend, OAuthConfig,
    OAuthConnector, Result, SecurityContext, StorageMethod, TokenResponse, UserInfo,
};
use force_filter::ForceServices;
use url::Url;

pub const SECRET: &str = "filter-test-secret-0123456789abcdef";
pub const APP_HOST: &str = "app.example.com";
pub const INSTANCE_URL: &str = "https://na1.salesforce.com";
pub const ENDPOINT: &str = "https://na1.salesforce.com/services/Soap/u/62.0/00Dxx0000001gPL";
pub const SESSION_ID: &str = "00Dxx0000001gPL!AQ4AQFilterTestSession";
pub const ORG_ID: &str = "00Dxx0000001gPL";
pub const USER_ID: &str = "005xx000001SwiUAAS";
pub const USER_NAME: &str = "alice@example.com";
pub const VALID_CODE: &str = "aPrxTestAuthorizationCode";

/// How the test backend answers logout calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    Succeed,
    Unreachable,
    Rejected,
}

/// In-process identity backend that records every call.
pub struct TestBackend {
    outcome: LogoutOutcome,
    logouts: AtomicUsize,
    exchanges: AtomicUsize,
    revoked: Mutex<Vec<String>>,
}

impl TestBackend {
    pub fn new() -> Arc<Self> {
        Self::with_outcome(LogoutOutcome::Succeed)
    }

    pub fn with_outcome(outcome: LogoutOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            logouts: AtomicUsize::new(0),
            exchanges: AtomicUsize::new(0),
            revoked: Mutex::new(Vec::new()),
        })
    }

    pub fn logout_calls(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub fn revoked_sessions(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityBackend for TestBackend {
    async fn logout(&self, config: &ConnectorConfig) -> Result<()> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        self.revoked
            .lock()
            .unwrap()
            .push(config.session_id().to_string());

        match self.outcome {
            LogoutOutcome::Succeed => Ok(()),
            LogoutOutcome::Unreachable => Err(Error::new(ErrorKind::ConnectionFailure(
                "connection refused".to_string(),
            ))),
            LogoutOutcome::Rejected => Err(Error::new(ErrorKind::OAuth {
                error: "invalid_token".to_string(),
                description: "the token is invalid".to_string(),
            })),
        }
    }

    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<TokenResponse> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if code != VALID_CODE {
            return Err(Error::new(ErrorKind::OAuth {
                error: "invalid_grant".to_string(),
                description: "expired authorization code".to_string(),
            }));
        }

        Ok(TokenResponse {
            access_token: SESSION_ID.to_string(),
            instance_url: INSTANCE_URL.to_string(),
            id: None,
            token_type: Some("Bearer".to_string()),
            scope: Some("api id".to_string()),
            signature: None,
            issued_at: None,
        })
    }

    async fn user_info(&self, _token: &TokenResponse) -> Result<UserInfo> {
        Ok(UserInfo {
            user_id: USER_ID.to_string(),
            organization_id: ORG_ID.to_string(),
            preferred_username: USER_NAME.to_string(),
            locale: "en_US".to_string(),
            language: "en_US".to_string(),
            zoneinfo: "America/Los_Angeles".to_string(),
            role: Some("CEO".to_string()),
        })
    }
}

pub fn services(backend: Arc<TestBackend>) -> Arc<ForceServices> {
    Arc::new(base_services(backend))
}

/// Services before sharing, for tests that need to set extra options.
pub fn base_services(backend: Arc<TestBackend>) -> ForceServices {
    let connector = OAuthConnector::new(
        OAuthConfig::new("test-consumer-key")
            .with_secret("test-consumer-secret")
            .with_login_url("https://login.salesforce.com"),
    );
    let cipher = ContextCipher::from_secret(SECRET).unwrap();
    ForceServices::new(connector, backend, cipher)
}

/// Request headers as an untrusted client might forge them.
pub fn forwarded_headers(cookie: Option<&str>) -> HeaderMap {
    let mut headers = request_headers(cookie);
    headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
    headers.insert("x-forwarded-host", HeaderValue::from_static("evil.example.net"));
    headers
}

pub fn context() -> SecurityContext {
    SecurityContext::new(SESSION_ID, Url::parse(ENDPOINT).unwrap())
        .with_org_id(ORG_ID)
        .with_user_id(USER_ID)
        .with_user_name(USER_NAME)
        .with_role("CEO")
        .with_locale("en_US")
        .with_language("en_US")
        .with_time_zone("America/Los_Angeles")
}

/// Cookies a browser would send back after `context` was stored.
pub fn stored_cookies(
    services: &ForceServices,
    method: StorageMethod,
    context: &SecurityContext,
) -> String {
    let mut response = HeaderMap::new();
    services
        .storage(method)
        .save(&HeaderMap::new(), &mut response, context)
        .unwrap();
    echo_cookies(&response)
}

/// Turn a response's `Set-Cookie` headers into a request `Cookie` value.
pub fn echo_cookies(response: &HeaderMap) -> String {
    [
        cookies::SECURITY_CONTEXT,
        cookies::FORCE_SID,
        cookies::FORCE_EP,
        cookies::SESSION_ID,
    ]
    .iter()
    .filter_map(|name| cookies::set_value_in(response, name).map(|v| format!("{}={}", name, v)))
    .collect::<Vec<_>>()
    .join("; ")
}

pub fn request(method: Method, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header(HOST, APP_HOST);
    if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn request_headers(cookie: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(HOST, HeaderValue::from_static(APP_HOST));
    if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
    }
    headers
}

pub fn location(response: &Response) -> &str {
    response.headers()[LOCATION].to_str().unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
