use crate::server::{
    Result, ServerError, ServerRouter,
    bio::{ArtistBio, BioClient},
    json::Json,
};
use axum::{Router, extract::State};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;

pub fn routes() -> ServerRouter {
    Router::new().typed_get(get_artist_bio)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/artists/{name}/bio", rejection(ServerError))]
struct ArtistBioPath {
    name: String,
}

async fn get_artist_bio(
    ArtistBioPath { name }: ArtistBioPath,
    State(bio_client): State<BioClient>,
) -> Result<Json<ArtistBio>> {
    let bio = bio_client.fetch_bio(&name).await?;

    Ok(Json(bio))
}
