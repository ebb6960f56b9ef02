use axum::http::{header, HeaderValue, Method};
use log::*;
use service::config::Config;
use time::Duration;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, CookieManagerLayer};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Parses request cookies and writes back whatever handlers add to the jar.
pub(crate) fn cookie_layer() -> CookieManagerLayer {
    CookieManagerLayer::new()
}

/// The long-lived cookie carrying `visitor_id`, refreshed on every visit.
///
/// In production the cookie must travel on credentialed cross-origin requests
/// from the UI, which browsers only allow for `Secure; SameSite=None`.
pub(crate) fn visitor_cookie(config: &Config, visitor_id: String) -> Cookie<'static> {
    let (secure, same_site) = if config.is_production() {
        (true, SameSite::None)
    } else {
        (false, SameSite::Lax)
    };

    Cookie::build((config.visitor_cookie_name.clone(), visitor_id))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(same_site)
        .max_age(Duration::days(config.visitor_expiry_days))
        .build()
}

/// Allow the configured origins to read the stream with credentials.
pub(crate) fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid allowed origin {origin:?}: {e}");
                None
            }
        })
        .collect();

    info!("CORS allowed origins: {:?}", config.allowed_origins);

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE])
}
