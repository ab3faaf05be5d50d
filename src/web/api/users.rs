//! Accounts: registration, token login/logout and user detail.

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{absolute_url, ApiError, ApiJson, MaybeApiUser, Page, PageQuery, PageRequest, RequireApiUser};
use crate::auth::{
    authenticate, generate_api_token, hash_password, password_problems, validate_username,
    LoginError,
};
use crate::db::{self as queries, limits, ProfileChanges, User, UserChanges};
use crate::media::media_url;
use crate::web::forms::{
    check_email, check_max_length, check_required, parse_birth_date, FormErrors, NON_FIELD_ERRORS,
};
use crate::web::{release_media, AppState};

/// Profile fields nested in a user.
#[derive(Debug, Serialize)]
pub struct NestedProfile {
    pub bio: String,
    pub age: Option<i32>,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserOut {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub profile: Option<NestedProfile>,
}

async fn user_out(state: &AppState, user: User) -> Result<UserOut, ApiError> {
    let profile = queries::get_profile_by_user(state.db.pool(), user.id)
        .await?
        .map(|p| NestedProfile {
            age: p.age(),
            avatar: p.avatar.as_deref().map(|a| absolute_url(state, &media_url(a))),
            bio: p.bio,
        });
    Ok(UserOut {
        id: user.id,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
        profile,
    })
}

// ========== Registration ==========

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    email: String,
}

/// POST /api/auth/users/
pub async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateUser>,
) -> Result<Response, ApiError> {
    let pool = state.db.pool();
    let username = body.username.trim().to_string();
    let email = body.email.trim().to_string();
    let mut errors = FormErrors::new();

    check_required(&mut errors, "username", &username, None);
    if errors.field("username").is_empty() {
        if let Err(message) = validate_username(&username) {
            errors.add("username", message);
        } else if queries::username_exists(pool, &username).await? {
            errors.add("username", "A user with that username already exists.");
        }
    }
    check_required(&mut errors, "password", &body.password, None);
    if errors.field("password").is_empty() {
        errors.extend("password", password_problems(&body.password));
    }
    check_email(&mut errors, "email", &email);
    errors.into_result()?;

    let password_hash = hash_password(&body.password)?;
    let id = queries::create_user(pool, &username, &password_hash, &email, false).await?;
    tracing::info!(user_id = id, username = %username, "Registered user through the API");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": id, "username": username, "email": email })),
    )
        .into_response())
}

/// GET /api/auth/users/ - The caller; administrators see everyone.
pub async fn list(
    State(state): State<AppState>,
    RequireApiUser(user): RequireApiUser,
    Query(query): Query<PageQuery>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Page<UserOut>>, ApiError> {
    let pool = state.db.pool();
    let page = PageRequest::parse(query.page.as_deref(), state.config.page_size)?;

    let is_admin = user.is_admin;
    let count = if is_admin {
        queries::count_users(pool).await?
    } else {
        1
    };
    let page = page.resolve(count)?;
    let users = if is_admin {
        queries::get_all_users(pool, page.size, page.offset()).await?
    } else {
        vec![user]
    };

    let mut results = Vec::with_capacity(users.len());
    for user in users {
        results.push(user_out(&state, user).await?);
    }
    let url = absolute_url(&state, "/api/auth/users/");
    Ok(Json(page.into_page(count, results, &url, raw.as_deref())))
}

// ========== Tokens ==========

#[derive(Debug, Deserialize)]
pub struct TokenLogin {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// POST /api/auth/token/login/ - Returns the caller's token, creating it once.
pub async fn token_login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TokenLogin>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let pool = state.db.pool();
    let user = match authenticate(pool, &body.username, &body.password).await {
        Ok(user) => user,
        Err(LoginError::Internal(e)) => return Err(ApiError::Internal(e)),
        Err(e) => {
            tracing::info!(username = %body.username, "API token login rejected: {e}");
            return Err(ApiError::field(
                NON_FIELD_ERRORS,
                "Unable to log in with provided credentials.",
            ));
        }
    };

    let token = queries::get_or_create_api_token(pool, user.id, &generate_api_token()).await?;
    tracing::info!(user_id = user.id, "API token issued");
    Ok(Json(json!({ "auth_token": token.key })))
}

/// POST /api/auth/token/logout/
pub async fn token_logout(
    State(state): State<AppState>,
    RequireApiUser(user): RequireApiUser,
) -> Result<StatusCode, ApiError> {
    queries::delete_api_token(state.db.pool(), user.id).await?;
    tracing::info!(user_id = user.id, "API token revoked");
    Ok(StatusCode::NO_CONTENT)
}

// ========== User detail ==========

/// GET /api/user/:id/
pub async fn detail(
    State(state): State<AppState>,
    MaybeApiUser(_caller): MaybeApiUser,
    Path(id): Path<i64>,
) -> Result<Json<UserOut>, ApiError> {
    let user = queries::get_user_by_id(state.db.pool(), id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(user_out(&state, user).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    bio: Option<String>,
    birth_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserUpdate {
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    profile: Option<ProfileUpdate>,
}

async fn own_user(state: &AppState, caller: &User, id: i64) -> Result<User, ApiError> {
    let user = queries::get_user_by_id(state.db.pool(), id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if user.id != caller.id {
        return Err(ApiError::Forbidden);
    }
    Ok(user)
}

/// PUT/PATCH /api/user/:id/ - Account fields and the nested profile.
pub async fn update(
    State(state): State<AppState>,
    RequireApiUser(caller): RequireApiUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UserUpdate>,
) -> Result<Json<UserOut>, ApiError> {
    let pool = state.db.pool();
    let user = own_user(&state, &caller, id).await?;

    let mut errors = FormErrors::new();
    if let Some(first_name) = &body.first_name {
        check_max_length(&mut errors, "first_name", first_name, Some(limits::NAME));
    }
    if let Some(last_name) = &body.last_name {
        check_max_length(&mut errors, "last_name", last_name, Some(limits::NAME));
    }
    if let Some(email) = &body.email {
        check_email(&mut errors, "email", email.trim());
    }

    let profile_update = body.profile.unwrap_or_default();
    if let Some(bio) = &profile_update.bio {
        check_max_length(&mut errors, "bio", bio, Some(limits::BIO));
    }
    let birth_date = match profile_update.birth_date.as_deref().map(parse_birth_date) {
        None => None,
        Some(Ok(date)) => Some(date),
        Some(Err(message)) => {
            errors.add("birth_date", message);
            None
        }
    };
    errors.into_result()?;

    queries::update_user_fields(
        pool,
        user.id,
        &UserChanges {
            email: body.email.map(|e| e.trim().to_string()),
            first_name: body.first_name,
            last_name: body.last_name,
        },
    )
    .await?;

    if profile_update.bio.is_some() || birth_date.is_some() {
        let profile_id = match queries::get_profile_by_user(pool, user.id).await? {
            Some(profile) => profile.id,
            None => queries::create_profile(pool, user.id).await?,
        };
        queries::update_profile(
            pool,
            profile_id,
            &ProfileChanges {
                bio: profile_update.bio,
                birth_date,
                avatar: None,
            },
        )
        .await?;
    }

    let user = queries::get_user_by_id(pool, user.id)
        .await?
        .ok_or(ApiError::NotFound)?;
    tracing::info!(user_id = user.id, "User updated through the API");
    Ok(Json(user_out(&state, user).await?))
}

/// DELETE /api/user/:id/ - Removes the account and everything it owns.
pub async fn destroy(
    State(state): State<AppState>,
    RequireApiUser(caller): RequireApiUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let pool = state.db.pool();
    let user = own_user(&state, &caller, id).await?;

    let files = queries::get_media_files_for_user(pool, user.id).await?;
    queries::delete_user(pool, user.id).await?;
    release_media(&state, &files).await;

    tracing::info!(user_id = user.id, "User deleted through the API");
    Ok(StatusCode::NO_CONTENT)
}
