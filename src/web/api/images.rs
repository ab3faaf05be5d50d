//! Post images uploaded as multipart `title`, `image` and `post`.

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::{
    absolute_url, caller_profile, parse_id, ApiError, ApiInput, MaybeApiUser, RequireApiUser,
};
use crate::db::{self as queries, limits, Image, ImageWithOwner, User};
use crate::media::{media_url, MediaKind};
use crate::permissions::can_access;
use crate::web::forms::{check_required, FormErrors};
use crate::web::{release_media, AppState};

#[derive(Debug, Serialize)]
pub struct ImageOut {
    pub id: i64,
    pub title: String,
    pub image: String,
    pub post: i64,
}

fn image_out(state: &AppState, image: Image) -> ImageOut {
    ImageOut {
        id: image.id,
        image: absolute_url(state, &media_url(&image.file)),
        title: image.title,
        post: image.post_id,
    }
}

/// POST /api/new-image/
pub async fn create(
    State(state): State<AppState>,
    RequireApiUser(caller): RequireApiUser,
    input: ApiInput,
) -> Result<Response, ApiError> {
    let pool = state.db.pool();
    let mut errors = FormErrors::new();

    let title = input.text("title").unwrap_or_default().trim().to_string();
    check_required(&mut errors, "title", &title, Some(limits::IMAGE_TITLE));
    if input.file("image").is_none() {
        errors.add("image", "No file was submitted.");
    }

    let profile_id = caller_profile(pool, &caller).await?;
    let mut post_id = None;
    match input.text("post").filter(|p| !p.trim().is_empty()) {
        None => errors.add("post", "This field is required."),
        Some(raw) => match parse_id(&raw) {
            Err(message) => errors.add("post", message),
            Ok(id) => match queries::get_post(pool, id).await? {
                None => errors.add("post", format!("Invalid pk \"{id}\" - object does not exist.")),
                Some(post) if Some(post.profile_id) != profile_id => {
                    errors.add("post", "You can only add images to your own posts.");
                }
                Some(post) => post_id = Some(post.id),
            },
        },
    }
    errors.into_result()?;

    let (Some(post_id), Some(file)) = (post_id, input.file("image")) else {
        return Err(ApiError::field("image", "No file was submitted."));
    };
    let stored = state.media.save_image(MediaKind::PostImage, &file.data).await?;
    let id = queries::create_image(pool, post_id, &title, stored.path()).await?;
    drop(stored);
    tracing::info!(image_id = id, post_id, "Image uploaded through the API");

    let image = queries::get_image(pool, id).await?.ok_or(ApiError::NotFound)?;
    Ok((StatusCode::CREATED, Json(image_out(&state, image))).into_response())
}

/// Load an image and check `caller` may use `method` on it.
async fn authorized_image(
    state: &AppState,
    caller: &User,
    method: &Method,
    id: i64,
) -> Result<ImageWithOwner, ApiError> {
    let pool = state.db.pool();
    let image = queries::get_image_with_owner(pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let viewer = caller_profile(pool, caller).await?;
    if !can_access(method, viewer, image.owner_profile_id) {
        return Err(ApiError::Forbidden);
    }
    Ok(image)
}

/// GET /api/image/:id/
pub async fn detail(
    State(state): State<AppState>,
    MaybeApiUser(_caller): MaybeApiUser,
    Path(id): Path<i64>,
) -> Result<Json<ImageOut>, ApiError> {
    let image = queries::get_image(state.db.pool(), id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(image_out(&state, image)))
}

/// PUT/PATCH /api/image/:id/ - New title and/or replacement file.
pub async fn update(
    State(state): State<AppState>,
    method: Method,
    RequireApiUser(caller): RequireApiUser,
    Path(id): Path<i64>,
    input: ApiInput,
) -> Result<Json<ImageOut>, ApiError> {
    let pool = state.db.pool();
    let image = authorized_image(&state, &caller, &method, id).await?;

    let mut errors = FormErrors::new();
    let title = input.text("title").map(|t| t.trim().to_string());
    match &title {
        Some(title) => check_required(&mut errors, "title", title, Some(limits::IMAGE_TITLE)),
        None if method == Method::PUT => errors.add("title", "This field is required."),
        None => {}
    }
    errors.into_result()?;

    let new_file = match input.file("image") {
        Some(file) => Some(state.media.save_image(MediaKind::PostImage, &file.data).await?),
        None => None,
    };
    queries::update_image(pool, image.id, title.as_deref(), new_file.as_ref().map(|f| f.path()))
        .await?;
    if new_file.is_some() {
        release_media(&state, &[image.file.clone()]).await;
    }
    tracing::info!(image_id = image.id, "Image updated through the API");

    let image = queries::get_image(pool, image.id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(image_out(&state, image)))
}

/// DELETE /api/image/:id/ - Removes the row and, when unshared, the stored file.
pub async fn destroy(
    State(state): State<AppState>,
    method: Method,
    RequireApiUser(caller): RequireApiUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let image = authorized_image(&state, &caller, &method, id).await?;

    queries::delete_image(state.db.pool(), image.id).await?;
    release_media(&state, &[image.file]).await;

    tracing::info!(image_id = id, "Image deleted through the API");
    Ok(StatusCode::NO_CONTENT)
}
