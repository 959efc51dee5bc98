use crate::server::{
    Result, ServerRouter,
    auth::AuthenticatedUser,
    json::Json,
    uploads::{UPLOAD_MAX_BYTES, UploadError, UploadStore},
};
use axum::{Router, body::Bytes, extract::{DefaultBodyLimit, State}};
use axum_extra::{TypedHeader, routing::{RouterExt, TypedPath}};
use headers::ContentType;
use mime::Mime;
use serde::Serialize;

pub fn routes() -> ServerRouter {
    // The extractor limit sits above the store's cap so an oversized upload
    // reaches the explicit size check and gets a 413, not a generic 400.
    Router::new()
        .typed_post(upload_image)
        .layer(DefaultBodyLimit::max(UPLOAD_MAX_BYTES + 1024))
}

// The POST endpoint lives beside, not under, the static `/uploads` mount so
// the two cannot collide in the router.
#[derive(TypedPath)]
#[typed_path("/images")]
struct UploadImagePath;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct UploadResponse {
    message: String,
    path: String,
}

async fn upload_image(
    _: UploadImagePath,
    _authenticated: AuthenticatedUser,
    State(store): State<UploadStore>,
    content_type: Option<TypedHeader<ContentType>>,
    body: Bytes,
) -> Result<Json<UploadResponse>> {
    let mime = content_type
        .map(|TypedHeader(content_type)| Mime::from(content_type))
        .ok_or(UploadError::UnsupportedImageType)?;

    let path = store.store(&mime, &body).await?;

    Ok(Json(UploadResponse {
        message: "Image uploaded.".to_owned(),
        path,
    }))
}
