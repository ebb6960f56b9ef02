use anyhow::{Context, Result};
use log::*;
use reqwest::header::SET_COOKIE;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct VisitorIdentity {
    pub visitor_id: String,
    /// `name=value` pair to send back in a `Cookie` header
    pub cookie: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisitorResponse {
    visitor_id: String,
}

/// Ask the server for a fresh visitor identity, the way a browser without
/// cookies would get one.
pub async fn fresh_visitor(client: &reqwest::Client, base_url: &str) -> Result<VisitorIdentity> {
    let url = format!("{}/visitor", base_url);
    let response = client.get(&url).send().await?.error_for_status()?;

    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .context("No identity cookie returned by /visitor")?
        .to_str()?
        .split(';')
        .next()
        .unwrap_or_default()
        .to_string();

    let body: VisitorResponse = response.json().await?;
    debug!("Obtained visitor {} ({})", body.visitor_id, cookie);

    Ok(VisitorIdentity {
        visitor_id: body.visitor_id,
        cookie,
    })
}
