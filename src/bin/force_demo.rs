//! Demo web application protected by the Force.com filters.
//!
//! ```sh
//! export FORCE_CONSUMER_KEY=... FORCE_CONSUMER_SECRET=...
//! export FORCE_COOKIE_SECRET='at least sixteen bytes of secret'
//! cargo run --bin force-demo
//! ```
//!
//! `FORCE_BIND_ADDR` overrides the listen address (default `127.0.0.1:8080`).
//! Behind a reverse proxy, set `FORCE_PUBLIC_ORIGIN` (e.g. `https://app.example.com`)
//! or `FORCE_TRUST_PROXY=true` so callback URLs point at the public host.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use force_sdk::auth::{
    ContextCipher, OAuthConfig, OAuthConnector, RequestOrigin, SalesforceIdentityBackend,
};
use force_sdk::filter::{
    AuthFilterConfig, AuthLayer, ForceContext, ForceServices, LogoutFilter, LogoutFilterConfig,
};
use force_sdk::SecurityContextHolder;
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const PURGE_PERIOD: Duration = Duration::from_secs(60);

async fn home(ForceContext(context): ForceContext) -> String {
    format!(
        "Signed in as {} ({}) in org {}\n",
        context.user_name(),
        context.role(),
        context.org_id()
    )
}

async fn endpoint() -> String {
    SecurityContextHolder::get()
        .map(|context| format!("{}\n", context.endpoint()))
        .unwrap_or_default()
}

async fn signed_out() -> &'static str {
    "Signed out\n"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let oauth = OAuthConfig::from_env().context("reading OAuth configuration")?;
    let secret = std::env::var("FORCE_COOKIE_SECRET").context("FORCE_COOKIE_SECRET is not set")?;
    let cipher = ContextCipher::from_secret(&secret).context("invalid FORCE_COOKIE_SECRET")?;

    let mut services = ForceServices::new(
        OAuthConnector::new(oauth.clone()),
        Arc::new(SalesforceIdentityBackend::new(oauth)),
        cipher,
    );
    if let Ok(trust) = std::env::var("FORCE_TRUST_PROXY") {
        let trust = trust
            .trim()
            .parse::<bool>()
            .context("FORCE_TRUST_PROXY must be 'true' or 'false'")?;
        services = services.with_trusted_proxy(trust);
    }
    if let Ok(origin) = std::env::var("FORCE_PUBLIC_ORIGIN") {
        let origin = RequestOrigin::parse(&origin).context("invalid FORCE_PUBLIC_ORIGIN")?;
        services = services.with_public_origin(origin);
    }
    let services = Arc::new(services);
    services.spawn_purge_task(PURGE_PERIOD);

    let auth_config = AuthFilterConfig::from_env()
        .context("reading auth filter configuration")?
        .with_excluded_paths(["/logout", "/signed-out"]);
    let logout_config = LogoutFilterConfig::from_env().context("reading logout configuration")?;

    let app = Router::new()
        .route("/", get(home))
        .route("/endpoint", get(endpoint))
        .route("/signed-out", get(signed_out))
        .merge(LogoutFilter::new(logout_config, services.clone()).into_router("/logout"))
        .layer(AuthLayer::new(auth_config, services));

    let addr = std::env::var("FORCE_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(addr = %addr, "Listening");

    axum::serve(listener, app).await?;
    Ok(())
}
