use crate::error::Error;
use crate::middleware::visitor_cookie;
use crate::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use log::*;
use presence::connection::VisitorId;
use tower_cookies::Cookies;

/// The stable identity of the client making the request.
///
/// Carried entirely by a signed http-only cookie, so nothing is kept on the
/// server per visitor. A valid cookie is returned as-is; a missing or tampered
/// one gets a freshly minted id. Either way the cookie is written back so its
/// expiry slides with each visit.
pub(crate) struct Visitor(pub VisitorId);

#[async_trait]
impl FromRequestParts<AppState> for Visitor {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|(_status, msg)| Error::cookies_unavailable(msg))?;

        let name = state.config.visitor_cookie_name.as_str();
        let signed = cookies.signed(&state.cookie_key);

        let visitor_id = match signed.get(name) {
            Some(cookie) => {
                trace!("Resolved returning visitor {}", cookie.value());
                cookie.value().to_string()
            }
            None => {
                if cookies.get(name).is_some() {
                    warn!("Ignoring visitor cookie with an invalid signature");
                }
                let visitor_id = uuid::Uuid::new_v4().to_string();
                debug!("Minted new visitor id {visitor_id}");
                visitor_id
            }
        };

        signed.add(visitor_cookie(&state.config, visitor_id.clone()));

        Ok(Visitor(visitor_id))
    }
}
