//! OAuth authentication filter and the security context extractor.
//!
//! [`AuthLayer`] sits in front of protected routes. It completes the OAuth
//! web-server flow on the callback path, restores the stored context on
//! every other request and exposes it through [`SecurityContextHolder`] and
//! the [`ForceContext`] extractor.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use force_auth::{
    OAuthConnector, RequestOrigin, SecurityContext, SecurityContextHolder, SecurityContextStorage,
};
use http::{HeaderMap, StatusCode, Uri};
use serde::Deserialize;
use tower::{Layer, Service};

use crate::config::AuthFilterConfig;
use crate::redirect::{error_response, redirect};
use crate::services::ForceServices;

/// Query parameters the provider sends to the callback path.
#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Shared state for the authentication middleware.
struct AuthState {
    config: AuthFilterConfig,
    services: Arc<ForceServices>,
    storage: Arc<dyn SecurityContextStorage>,
}

impl AuthState {
    fn connector(&self) -> &OAuthConnector {
        self.services.connector()
    }

    fn origin(&self, headers: &HeaderMap) -> RequestOrigin {
        self.services.origin(headers)
    }

    /// Redirect to the provider, remembering where the user was going.
    fn login_redirect(&self, request: &Request<Body>, set_cookies: HeaderMap) -> Response {
        let state = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        match self
            .connector()
            .authorization_url(&self.origin(request.headers()), Some(state))
        {
            Ok(url) => redirect(&url, set_cookies),
            Err(e) => {
                tracing::error!(error = %e, "Could not build authorization URL");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "authentication unavailable")
            }
        }
    }

    /// Complete the OAuth web-server flow.
    ///
    /// Takes parts, not the request: the body is not `Sync`.
    async fn handle_callback(&self, uri: &Uri, headers: &HeaderMap) -> Response {
        let params: CallbackParams = uri
            .query()
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default();

        if let Some(error) = params.error {
            tracing::warn!(error = %error, "Provider denied authorization");
            return error_response(StatusCode::UNAUTHORIZED, "authorization denied");
        }

        let Some(code) = params.code else {
            return error_response(StatusCode::BAD_REQUEST, "missing authorization code");
        };

        let mut set_cookies = HeaderMap::new();
        match self.authenticate(headers, &code, &mut set_cookies).await {
            Ok(context) => {
                tracing::info!(user_id = %context.user_id(), "Authenticated");
                redirect(local_target(params.state.as_deref()), set_cookies)
            }
            Err(e) => {
                tracing::warn!(error = %e, "OAuth callback failed");
                error_response(StatusCode::UNAUTHORIZED, "authentication failed")
            }
        }
    }

    async fn authenticate(
        &self,
        headers: &HeaderMap,
        code: &str,
        set_cookies: &mut HeaderMap,
    ) -> force_auth::Result<SecurityContext> {
        let redirect_uri = self.connector().redirect_uri(&self.origin(headers))?;
        let backend = self.services.backend();

        let token = backend.exchange_code(code, &redirect_uri).await?;
        let user = backend.user_info(&token).await?;
        let context = token.to_security_context(&user, &self.config.api_version)?;

        self.storage.save(headers, set_cookies, &context)?;
        self.services.cache().put(&context);
        Ok(context)
    }
}

/// Only same-site absolute paths are honored as post-login targets.
fn local_target(state: Option<&str>) -> &str {
    match state {
        Some(s) if s.starts_with('/') && !s.starts_with("//") => s,
        _ => "/",
    }
}

/// Layer that applies OAuth authentication to services.
///
/// Apply it last: the callback path is served by the router's fallback,
/// which only carries layers added after every `merge`.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .route("/", get(home))
///     .merge(LogoutFilter::new(LogoutFilterConfig::default(), services.clone()).into_router("/logout"))
///     .layer(AuthLayer::new(AuthFilterConfig::default(), services));
/// ```
#[derive(Clone)]
pub struct AuthLayer {
    state: Arc<AuthState>,
}

impl AuthLayer {
    pub fn new(config: AuthFilterConfig, services: Arc<ForceServices>) -> Self {
        let storage = services.storage(config.storage_method);
        tracing::info!(
            storage_method = %config.storage_method,
            callback_path = %services.connector().config().callback_path,
            "Auth filter initialized"
        );
        Self {
            state: Arc::new(AuthState {
                config,
                services,
                storage,
            }),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            state: self.state.clone(),
        }
    }
}

/// Service that authenticates requests before passing them on.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    state: Arc<AuthState>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let state = self.state.clone();
        let not_ready_inner = self.inner.clone();
        let mut ready_inner = std::mem::replace(&mut self.inner, not_ready_inner);

        Box::pin(async move {
            let path = request.uri().path();

            if state.config.is_excluded(path) {
                return ready_inner.call(request).await;
            }

            if path == state.connector().config().callback_path {
                let (uri, headers) = (request.uri(), request.headers());
                return Ok(state.handle_callback(uri, headers).await);
            }

            let loaded = state.storage.load(request.headers());
            match loaded {
                Ok(Some(context)) => {
                    request.extensions_mut().insert(context.clone());
                    SecurityContextHolder::scope(Some(context), ready_inner.call(request)).await
                }
                Ok(None) => Ok(state.login_redirect(&request, HeaderMap::new())),
                Err(e) if e.is_context_unreadable() => {
                    // Never pass through on a context we cannot trust.
                    tracing::warn!(error = %e, "Stored security context unreadable, re-authenticating");
                    let mut set_cookies = HeaderMap::new();
                    state.storage.clear(request.headers(), &mut set_cookies);
                    Ok(state.login_redirect(&request, set_cookies))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load security context");
                    Ok(error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "security context unavailable",
                    ))
                }
            }
        })
    }
}

/// Extractor for the authenticated [`SecurityContext`].
///
/// Rejects with `401 Unauthorized` when [`AuthLayer`] did not run.
#[derive(Debug, Clone)]
pub struct ForceContext(pub SecurityContext);

impl<S> FromRequestParts<S> for ForceContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SecurityContext>()
            .cloned()
            .map(ForceContext)
            .ok_or_else(|| (StatusCode::UNAUTHORIZED, "not authenticated").into_response())
    }
}
