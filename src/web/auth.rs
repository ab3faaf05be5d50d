//! Registration, login, logout and profile pages.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;

use super::forms::{check_email, check_max_length, parse_birth_date, FormErrors};
use super::multipart::MultipartForm;
use super::pages::{self, ProfileFormValues, RegisterValues};
use super::{check_csrf, maybe_viewer, release_media, viewer_for, AppState, WebError};
use crate::auth::{
    authenticate, clear_session_cookie, hash_password, safe_next, session_cookie,
    start_session, validate_new_password, validate_username,
    ClientInfo, LoginError, MaybeUser, RequireUser, SessionDuration, CSRF_FIELD,
};
use crate::db::{self as queries, limits, ProfileChanges, UserChanges};
use crate::media::MediaKind;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/get-started/", get(get_started_page).post(get_started_post))
        .route("/users/login/", get(login_page).post(login_post))
        .route("/users/logout/", post(logout))
        .route("/users/profile-details/:id/", get(profile_details))
        .route("/users/profile-public/:id/", get(profile_public))
        .route(
            "/users/profile-update/:id/",
            get(profile_update_page).post(profile_update_post),
        )
}

fn html_response(markup: maud::Markup) -> Response {
    Html(markup.into_string()).into_response()
}

/// Redirect and set the session cookie.
fn redirect_with_cookie(location: &str, cookie: String) -> Response {
    ([(header::SET_COOKIE, cookie)], Redirect::to(location)).into_response()
}

// ========== Registration ==========

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password1: String,
    #[serde(default)]
    password2: String,
}

/// GET /users/get-started/
async fn get_started_page(MaybeUser(user): MaybeUser) -> Response {
    if user.is_some() {
        return Redirect::to("/main/").into_response();
    }
    html_response(pages::get_started_page(
        &RegisterValues::default(),
        &FormErrors::new(),
    ))
}

/// POST /users/get-started/ - Create the account and its profile, then sign in.
async fn get_started_post(
    State(state): State<AppState>,
    client: ClientInfo,
    Form(form): Form<RegisterForm>,
) -> Result<Response, WebError> {
    let pool = state.db.pool();
    let username = form.username.trim().to_string();
    let mut errors = FormErrors::new();

    if let Err(message) = validate_username(&username) {
        errors.add("username", message);
    } else if queries::username_exists(pool, &username).await? {
        errors.add("username", "A user with that username already exists.");
    }
    if let Err(problems) = validate_new_password(&form.password1, &form.password2) {
        errors.extend("password2", problems);
    }

    if !errors.is_empty() {
        let values = RegisterValues { username };
        return Ok(html_response(pages::get_started_page(&values, &errors)));
    }

    let password_hash = hash_password(&form.password1)?;
    let (user_id, profile_id) =
        queries::create_user_with_profile(pool, &username, &password_hash).await?;
    tracing::info!(user_id, username = %username, "Registered new user");

    let session = start_session(
        pool,
        user_id,
        SessionDuration::Short,
        &client.ip,
        client.user_agent.as_deref(),
    )
    .await?;

    Ok(redirect_with_cookie(
        &format!("/users/profile-update/{profile_id}/"),
        session_cookie(&session.token, session.max_age, state.config.cookie_secure),
    ))
}

// ========== Login / Logout ==========

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    remember: bool,
    next: Option<String>,
}

/// GET /users/login/
async fn login_page(MaybeUser(user): MaybeUser, Query(query): Query<NextQuery>) -> Response {
    let next = safe_next(query.next.as_deref());
    if user.is_some() {
        return Redirect::to(next.unwrap_or("/main/")).into_response();
    }
    html_response(pages::login_page(None, "", next))
}

/// POST /users/login/
async fn login_post(
    State(state): State<AppState>,
    client: ClientInfo,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    let pool = state.db.pool();
    let next = safe_next(form.next.as_deref());

    let user = match authenticate(pool, &form.username, &form.password).await {
        Ok(user) => user,
        Err(LoginError::Internal(e)) => return Err(WebError::Internal(e)),
        Err(e) => {
            tracing::info!(username = %form.username, "Login rejected: {e}");
            return Ok(html_response(pages::login_page(
                Some(&e.to_string()),
                form.username.trim(),
                next,
            )));
        }
    };

    let profile_id = match queries::get_profile_by_user(pool, user.id).await? {
        Some(profile) => profile.id,
        None => queries::create_profile(pool, user.id).await?,
    };

    let duration = SessionDuration::from_remember(form.remember);
    let session = start_session(
        pool,
        user.id,
        duration,
        &client.ip,
        client.user_agent.as_deref(),
    )
    .await?;
    tracing::info!(user_id = user.id, "User logged in");

    let default_target = format!("/users/profile-details/{profile_id}/");
    Ok(redirect_with_cookie(
        next.unwrap_or(&default_target),
        session_cookie(&session.token, session.max_age, state.config.cookie_secure),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CsrfForm {
    csrf_token: Option<String>,
}

/// POST /users/logout/
async fn logout(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Form(form): Form<CsrfForm>,
) -> Result<Response, WebError> {
    check_csrf(&current, form.csrf_token.as_deref())?;

    queries::delete_session(state.db.pool(), &current.session.token).await?;
    tracing::info!(user_id = current.user.id, "User logged out");

    Ok(redirect_with_cookie(
        "/main/",
        clear_session_cookie(state.config.cookie_secure),
    ))
}

// ========== Profiles ==========

/// GET /users/profile-details/:id/ - Private profile page, owner only.
async fn profile_details(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let pool = state.db.pool();
    let profile = queries::get_profile_with_user(pool, id)
        .await?
        .ok_or(WebError::NotFound)?;
    if profile.user_id != current.user.id {
        return Err(WebError::Forbidden);
    }

    let blogs = queries::get_blogs_for_profile(pool, profile.id).await?;
    let viewer = viewer_for(pool, &current).await;
    Ok(html_response(pages::profile_details_page(
        &viewer, &profile, &blogs,
    )))
}

/// GET /users/profile-public/:id/
async fn profile_public(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let pool = state.db.pool();
    let profile = queries::get_profile_with_user(pool, id)
        .await?
        .ok_or(WebError::NotFound)?;

    let blogs = queries::get_blogs_for_profile(pool, profile.id).await?;
    let viewer = maybe_viewer(pool, current.as_ref()).await;
    Ok(html_response(pages::profile_public_page(
        viewer.as_ref(),
        &profile,
        &blogs,
    )))
}

/// GET /users/profile-update/:id/
async fn profile_update_page(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let pool = state.db.pool();
    let profile = queries::get_profile_with_user(pool, id)
        .await?
        .ok_or(WebError::NotFound)?;
    if profile.user_id != current.user.id {
        return Err(WebError::Forbidden);
    }

    let viewer = viewer_for(pool, &current).await;
    let values = ProfileFormValues::from_profile(&profile);
    Ok(html_response(pages::profile_update_page(
        &viewer,
        &profile,
        &values,
        &FormErrors::new(),
    )))
}

/// POST /users/profile-update/:id/ - Account fields, bio, birth date and avatar.
async fn profile_update_post(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, WebError> {
    let pool = state.db.pool();
    let profile = queries::get_profile_with_user(pool, id)
        .await?
        .ok_or(WebError::NotFound)?;
    if profile.user_id != current.user.id {
        return Err(WebError::Forbidden);
    }

    let form = MultipartForm::read(multipart).await?;
    check_csrf(&current, form.text(CSRF_FIELD))?;

    let field = |name: &str| form.text(name).unwrap_or_default().trim().to_string();
    let values = ProfileFormValues {
        first_name: field("first_name"),
        last_name: field("last_name"),
        email: field("email"),
        bio: field("bio"),
        birth_date: field("birth_date"),
    };

    let mut errors = FormErrors::new();
    check_max_length(&mut errors, "first_name", &values.first_name, Some(limits::NAME));
    check_max_length(&mut errors, "last_name", &values.last_name, Some(limits::NAME));
    check_email(&mut errors, "email", &values.email);
    check_max_length(&mut errors, "bio", &values.bio, Some(limits::BIO));
    let birth_date = match parse_birth_date(&values.birth_date) {
        Ok(date) => date,
        Err(message) => {
            errors.add("birth_date", message);
            None
        }
    };

    let mut new_avatar = None;
    if errors.is_empty() {
        if let Some(file) = form.file("avatar") {
            match state.media.save_image(MediaKind::Avatar, &file.data).await {
                Ok(path) => new_avatar = Some(path),
                Err(crate::media::MediaError::Io(e)) => {
                    return Err(WebError::Internal(
                        anyhow::Error::new(e).context("Failed to store avatar"),
                    ));
                }
                Err(e) => errors.add("avatar", e.to_string()),
            }
        }
    }

    if !errors.is_empty() {
        let viewer = viewer_for(pool, &current).await;
        return Ok(html_response(pages::profile_update_page(
            &viewer, &profile, &values, &errors,
        )));
    }

    let clear_avatar = form.text("avatar_clear").is_some_and(|v| v == "true");
    let avatar_change = match &new_avatar {
        Some(stored) => Some(Some(stored.path().to_string())),
        None if clear_avatar => Some(None),
        None => None,
    };
    let replaced_avatar = avatar_change.as_ref().and(profile.avatar.clone());

    queries::update_user_fields(
        pool,
        current.user.id,
        &UserChanges {
            email: Some(values.email),
            first_name: Some(values.first_name),
            last_name: Some(values.last_name),
        },
    )
    .await?;
    queries::update_profile(
        pool,
        profile.id,
        &ProfileChanges {
            bio: Some(values.bio),
            birth_date: Some(birth_date),
            avatar: avatar_change,
        },
    )
    .await?;

    if let Some(old) = replaced_avatar {
        release_media(&state, &[old]).await;
    }

    tracing::info!(profile_id = profile.id, "Profile updated");
    Ok(Redirect::to(&format!("/users/profile-details/{}/", profile.id)).into_response())
}

