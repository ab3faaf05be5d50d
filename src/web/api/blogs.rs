//! Blogs: creation, listing and owner-only detail writes.

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    absolute_url, caller_profile, ensure_caller_profile, ApiError, ApiJson, MaybeApiUser, Page,
    PageRequest, RequireApiUser,
};
use crate::db::{self as queries, limits, BlogFilter, BlogWithOwner, User};
use crate::permissions::can_access;
use crate::web::forms::{check_required, validate_blog, FormErrors};
use crate::web::{release_media, AppState};

#[derive(Debug, Serialize)]
pub struct OwnerRef {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct BlogOut {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub posts: Vec<String>,
    pub profile: OwnerRef,
}

async fn blog_out(state: &AppState, blog: BlogWithOwner) -> Result<BlogOut, ApiError> {
    let posts = queries::get_post_ids_for_blog(state.db.pool(), blog.id)
        .await?
        .into_iter()
        .map(|id| absolute_url(state, &format!("/api/post/{id}/")))
        .collect();
    Ok(BlogOut {
        id: blog.id,
        title: blog.title,
        description: blog.description,
        posts,
        profile: OwnerRef {
            id: blog.profile_id,
            username: blog.username,
        },
    })
}

#[derive(Debug, Deserialize)]
pub struct BlogInput {
    title: Option<String>,
    description: Option<String>,
}

/// POST /api/new-blog/
pub async fn create(
    State(state): State<AppState>,
    RequireApiUser(caller): RequireApiUser,
    ApiJson(body): ApiJson<BlogInput>,
) -> Result<Response, ApiError> {
    let pool = state.db.pool();
    let title = body.title.unwrap_or_default().trim().to_string();
    let description = body.description.unwrap_or_default().trim().to_string();
    validate_blog(&title, &description).into_result()?;

    let profile_id = ensure_caller_profile(pool, &caller).await?;
    let id = queries::create_blog(pool, profile_id, &title, &description).await?;
    tracing::info!(blog_id = id, profile_id, "Blog created through the API");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": id, "title": title, "description": description })),
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct BlogListQuery {
    page: Option<String>,
    search: Option<String>,
    username: Option<String>,
    title: Option<String>,
}

/// GET /api/blogs/
pub async fn list(
    State(state): State<AppState>,
    MaybeApiUser(_caller): MaybeApiUser,
    Query(query): Query<BlogListQuery>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Page<BlogOut>>, ApiError> {
    let pool = state.db.pool();
    let filter = BlogFilter {
        search: query.search,
        username: query.username,
        title: query.title,
        profile_id: None,
    };

    let count = queries::count_blogs(pool, &filter).await?;
    let page = PageRequest::parse(query.page.as_deref(), state.config.page_size)?.resolve(count)?;
    let blogs = queries::list_blogs(pool, &filter, page.size, page.offset()).await?;

    let mut results = Vec::with_capacity(blogs.len());
    for blog in blogs {
        results.push(blog_out(&state, blog).await?);
    }
    let url = absolute_url(&state, "/api/blogs/");
    Ok(Json(page.into_page(count, results, &url, raw.as_deref())))
}

/// Load a blog and check the caller may use `method` on it.
async fn authorized_blog(
    state: &AppState,
    caller: &User,
    method: &Method,
    id: i64,
) -> Result<BlogWithOwner, ApiError> {
    let blog = queries::get_blog_with_owner(state.db.pool(), id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let viewer = caller_profile(state.db.pool(), caller).await?;
    if !can_access(method, viewer, blog.profile_id) {
        return Err(ApiError::Forbidden);
    }
    Ok(blog)
}

/// GET /api/blog/:id/ - Signed-in callers only.
pub async fn detail(
    State(state): State<AppState>,
    method: Method,
    RequireApiUser(caller): RequireApiUser,
    Path(id): Path<i64>,
) -> Result<Json<BlogOut>, ApiError> {
    let blog = authorized_blog(&state, &caller, &method, id).await?;
    Ok(Json(blog_out(&state, blog).await?))
}

/// PUT/PATCH /api/blog/:id/ - PUT needs every field, PATCH only the changed ones.
pub async fn update(
    State(state): State<AppState>,
    method: Method,
    RequireApiUser(caller): RequireApiUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<BlogInput>,
) -> Result<Json<BlogOut>, ApiError> {
    let blog = authorized_blog(&state, &caller, &method, id).await?;

    let errors = if method == Method::PUT {
        validate_blog(
            body.title.as_deref().unwrap_or_default().trim(),
            body.description.as_deref().unwrap_or_default().trim(),
        )
    } else {
        let mut errors = FormErrors::new();
        if let Some(title) = &body.title {
            check_required(&mut errors, "title", title, Some(limits::BLOG_TITLE));
        }
        if let Some(description) = &body.description {
            check_required(
                &mut errors,
                "description",
                description,
                Some(limits::BLOG_DESCRIPTION),
            );
        }
        errors
    };
    errors.into_result()?;

    let title = body.title.map_or(blog.title, |t| t.trim().to_string());
    let description = body
        .description
        .map_or(blog.description, |d| d.trim().to_string());
    queries::update_blog(state.db.pool(), id, &title, &description).await?;
    tracing::info!(blog_id = id, "Blog updated through the API");

    let blog = queries::get_blog_with_owner(state.db.pool(), id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(blog_out(&state, blog).await?))
}

/// DELETE /api/blog/:id/ - Removes the blog, its posts and their images.
pub async fn destroy(
    State(state): State<AppState>,
    method: Method,
    RequireApiUser(caller): RequireApiUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let blog = authorized_blog(&state, &caller, &method, id).await?;

    let files = queries::get_image_files_for_blog(state.db.pool(), blog.id).await?;
    queries::delete_blog(state.db.pool(), blog.id).await?;
    release_media(&state, &files).await;

    tracing::info!(blog_id = blog.id, "Blog deleted through the API");
    Ok(StatusCode::NO_CONTENT)
}
