//! Profiles: listing with filters, creation and owner-only updates.

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{absolute_url, ApiError, ApiInput, MaybeApiUser, Page, PageRequest, RequireApiUser};
use crate::db::{self as queries, limits, ProfileChanges, ProfileFilter, ProfileWithUser};
use crate::media::{media_url, MediaKind, StoredMedia};
use crate::web::forms::{check_max_length, parse_birth_date, FormErrors};
use crate::web::{release_media, AppState};

#[derive(Debug, Serialize)]
pub struct ProfileOut {
    pub id: i64,
    pub user: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: Option<i32>,
    pub birth_date: Option<String>,
    pub bio: String,
    pub avatar: Option<String>,
    pub blogs: Vec<String>,
    pub posts: Vec<String>,
}

async fn profile_out(state: &AppState, profile: ProfileWithUser) -> Result<ProfileOut, ApiError> {
    let pool = state.db.pool();
    let blogs = queries::get_blog_ids_for_profile(pool, profile.id)
        .await?
        .into_iter()
        .map(|id| absolute_url(state, &format!("/api/blog/{id}/")))
        .collect();
    let posts = queries::get_post_ids_for_profile(pool, profile.id)
        .await?
        .into_iter()
        .map(|id| absolute_url(state, &format!("/api/post/{id}/")))
        .collect();

    Ok(ProfileOut {
        id: profile.id,
        user: profile.user_id,
        age: profile.profile().age(),
        avatar: profile
            .avatar
            .as_deref()
            .map(|a| absolute_url(state, &media_url(a))),
        username: profile.username,
        first_name: profile.first_name,
        last_name: profile.last_name,
        email: profile.email,
        birth_date: profile.birth_date,
        bio: profile.bio,
        blogs,
        posts,
    })
}

async fn load_profile(state: &AppState, id: i64) -> Result<ProfileWithUser, ApiError> {
    queries::get_profile_with_user(state.db.pool(), id)
        .await?
        .ok_or(ApiError::NotFound)
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileListQuery {
    page: Option<String>,
    search: Option<String>,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    birthday_after: Option<String>,
    birthday_before: Option<String>,
}

/// GET /api/profiles/
pub async fn list(
    State(state): State<AppState>,
    MaybeApiUser(_caller): MaybeApiUser,
    Query(query): Query<ProfileListQuery>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Page<ProfileOut>>, ApiError> {
    let pool = state.db.pool();
    let filter = ProfileFilter {
        search: query.search,
        username: query.username,
        first_name: query.first_name,
        last_name: query.last_name,
        email: query.email,
        birthday_after: query.birthday_after,
        birthday_before: query.birthday_before,
    };

    let count = queries::count_profiles(pool, &filter).await?;
    let page = PageRequest::parse(query.page.as_deref(), state.config.page_size)?.resolve(count)?;
    let profiles = queries::list_profiles(pool, &filter, page.size, page.offset()).await?;

    let mut results = Vec::with_capacity(profiles.len());
    for profile in profiles {
        results.push(profile_out(&state, profile).await?);
    }
    let url = absolute_url(&state, "/api/profiles/");
    Ok(Json(page.into_page(count, results, &url, raw.as_deref())))
}

/// Validate the writable profile fields present in `input` and store any new avatar.
///
/// The stored avatar stays pinned until the returned guard is dropped.
async fn read_changes(
    state: &AppState,
    input: &ApiInput,
) -> Result<(ProfileChanges, Option<StoredMedia>), ApiError> {
    let mut errors = FormErrors::new();

    let bio = input.text("bio").map(|b| b.trim().to_string());
    if let Some(bio) = &bio {
        check_max_length(&mut errors, "bio", bio, Some(limits::BIO));
    }
    let birth_date = match input.text("birth_date").map(|d| parse_birth_date(&d)) {
        None => None,
        Some(Ok(date)) => Some(date),
        Some(Err(message)) => {
            errors.add("birth_date", message);
            None
        }
    };
    errors.into_result()?;

    let stored = match input.file("avatar") {
        Some(file) => Some(state.media.save_image(MediaKind::Avatar, &file.data).await?),
        None => None,
    };
    let avatar = match &stored {
        Some(stored) => Some(Some(stored.path().to_string())),
        None if input.is_cleared("avatar") => Some(None),
        None => None,
    };

    let changes = ProfileChanges {
        bio,
        birth_date,
        avatar,
    };
    Ok((changes, stored))
}

/// POST /api/new-profile/ - A profile for the caller, who must not have one yet.
pub async fn create(
    State(state): State<AppState>,
    RequireApiUser(caller): RequireApiUser,
    input: ApiInput,
) -> Result<Response, ApiError> {
    let pool = state.db.pool();
    if queries::get_profile_by_user(pool, caller.id).await?.is_some() {
        return Err(ApiError::Forbidden);
    }

    let (changes, stored) = read_changes(&state, &input).await?;
    let id = match queries::create_profile_with_changes(pool, caller.id, &changes).await {
        Ok(id) => id,
        Err(e) => {
            if let Some(stored) = stored {
                let avatar = stored.path().to_string();
                drop(stored);
                release_media(&state, &[avatar]).await;
            }
            return Err(e.into());
        }
    };
    drop(stored);
    tracing::info!(profile_id = id, user_id = caller.id, "Profile created through the API");

    let profile = load_profile(&state, id).await?;
    Ok((StatusCode::CREATED, Json(profile_out(&state, profile).await?)).into_response())
}

/// GET /api/profile/:id/
pub async fn detail(
    State(state): State<AppState>,
    MaybeApiUser(_caller): MaybeApiUser,
    Path(id): Path<i64>,
) -> Result<Json<ProfileOut>, ApiError> {
    let profile = load_profile(&state, id).await?;
    Ok(Json(profile_out(&state, profile).await?))
}

/// PUT/PATCH /api/profile/:id/ - Bio, birth date and avatar, JSON or multipart.
pub async fn update(
    State(state): State<AppState>,
    RequireApiUser(caller): RequireApiUser,
    Path(id): Path<i64>,
    input: ApiInput,
) -> Result<Json<ProfileOut>, ApiError> {
    let profile = load_profile(&state, id).await?;
    if profile.user_id != caller.id {
        return Err(ApiError::Forbidden);
    }

    let (changes, stored) = read_changes(&state, &input).await?;
    queries::update_profile(state.db.pool(), profile.id, &changes).await?;
    drop(stored);
    if let (Some(_), Some(old)) = (&changes.avatar, profile.avatar) {
        release_media(&state, &[old]).await;
    }
    tracing::info!(profile_id = profile.id, "Profile updated through the API");

    let profile = load_profile(&state, id).await?;
    Ok(Json(profile_out(&state, profile).await?))
}
