use actix_web::web::Data;
use actix_web::{HttpResponse, Responder};
use broadcast_engine::Catalog;
use std::sync::Arc;

/// Flattened topic menu: every leaf with the names of its categories.
pub(crate) async fn list_catalog(catalog: Data<Arc<dyn Catalog>>) -> impl Responder {
    HttpResponse::Ok().json(catalog.leaves())
}
