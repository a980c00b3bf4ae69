use actix_web::web::{Data, Json, Path};
use actix_web::{HttpResponse, Responder};
use broadcast_engine::{DestinationId, SessionRegistry};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Deserialize)]
pub(crate) struct StartRadioRequest {
    /// Empty or `random` picks a catalog topic.
    #[serde(default)]
    query: String,
    #[serde(default)]
    display_name: Option<String>,
}

pub(crate) async fn start_radio(
    registry: Data<Arc<SessionRegistry>>,
    destination: Path<i64>,
    request: Json<StartRadioRequest>,
) -> impl Responder {
    let destination = DestinationId(destination.into_inner());

    info!(%destination, query = %request.query, "Radio start requested");

    let status = registry
        .start(destination, &request.query, request.display_name.as_deref())
        .await;

    HttpResponse::Ok().json(status)
}

pub(crate) async fn stop_radio(
    registry: Data<Arc<SessionRegistry>>,
    destination: Path<i64>,
) -> impl Responder {
    let destination = DestinationId(destination.into_inner());

    match registry.stop(destination).await {
        true => HttpResponse::Ok().finish(),
        false => HttpResponse::NotFound().finish(),
    }
}

pub(crate) async fn skip_track(
    registry: Data<Arc<SessionRegistry>>,
    destination: Path<i64>,
) -> impl Responder {
    match registry.skip(DestinationId(destination.into_inner())) {
        true => HttpResponse::Ok().finish(),
        false => HttpResponse::NotFound().finish(),
    }
}

pub(crate) async fn get_radio_status(
    registry: Data<Arc<SessionRegistry>>,
    destination: Path<i64>,
) -> impl Responder {
    match registry.status(DestinationId(destination.into_inner())) {
        Some(status) => HttpResponse::Ok().json(status),
        None => HttpResponse::NotFound().finish(),
    }
}
