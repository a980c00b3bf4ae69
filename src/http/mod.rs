mod catalog;
mod health;
mod player;
mod radio;

use actix_web::web;

pub(crate) use catalog::list_catalog;
pub(crate) use health::readiness_check;
pub(crate) use player::{search_tracks, stream_track, TrackIndex};
pub(crate) use radio::{get_radio_status, skip_track, start_radio, stop_radio};

pub(crate) fn routes(config: &mut web::ServiceConfig) {
    config
        .service(web::resource("/health").route(web::get().to(readiness_check)))
        .service(web::resource("/catalog").route(web::get().to(list_catalog)))
        .service(web::resource("/search").route(web::get().to(search_tracks)))
        .service(web::resource("/stream/{id}").route(web::get().to(stream_track)))
        .service(web::resource("/radio/{destination}").route(web::get().to(get_radio_status)))
        .service(web::resource("/radio/{destination}/start").route(web::post().to(start_radio)))
        .service(web::resource("/radio/{destination}/stop").route(web::post().to(stop_radio)))
        .service(web::resource("/radio/{destination}/skip").route(web::post().to(skip_track)));
}
