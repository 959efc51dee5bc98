use crate::server::ServerRouter;
use axum::Router;

mod artists;
mod auth;
mod contents;
mod uploads;
mod users;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(auth::routes())
        .merge(users::routes())
        .merge(contents::routes())
        .merge(artists::routes())
        .merge(uploads::routes())
}
