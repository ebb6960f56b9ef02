use crate::extractors::visitor::Visitor;
use axum::Json;
use log::*;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorResponse {
    pub visitor_id: String,
}

/// GET the caller's visitor identity, minting one on first contact.
pub(crate) async fn read(Visitor(visitor_id): Visitor) -> Json<VisitorResponse> {
    debug!("Visitor identity requested by {visitor_id}");
    Json(VisitorResponse { visitor_id })
}
