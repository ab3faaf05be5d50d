//! Posts: creation in the caller's blogs, listing and detail.
//!
//! Unpublished posts are visible to their owner only. Changing `is_published`
//! through an update publishes or archives the post, so `published_at`
//! always follows the flag.

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::blogs::OwnerRef;
use super::{
    absolute_url, caller_profile, ApiError, ApiJson, MaybeApiUser, Page, PageRequest,
    RequireApiUser,
};
use crate::db::{self as queries, limits, NewPost, Post, PostChanges, PostFilter, PostWithRefs, User};
use crate::permissions::can_access_post;
use crate::web::forms::{check_required, validate_post, FormErrors};
use crate::web::{release_media, AppState};

#[derive(Debug, Serialize)]
pub struct ImageRef {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct BlogRef {
    pub id: i64,
    pub title: String,
}

/// A post as listed.
#[derive(Debug, Serialize)]
pub struct PostListItem {
    pub id: i64,
    pub title: String,
    pub tag: String,
    pub content: String,
    pub created_at: String,
    pub is_published: bool,
    pub blog: BlogRef,
    pub profile: OwnerRef,
    pub images: Vec<ImageRef>,
}

/// A single post with its publication state.
#[derive(Debug, Serialize)]
pub struct PostDetail {
    pub id: i64,
    pub title: String,
    pub tag: String,
    pub blog: i64,
    pub profile: i64,
    pub content: String,
    pub created_at: String,
    pub is_published: bool,
    pub published_at: Option<String>,
    pub images: Vec<ImageRef>,
}

async fn image_refs(state: &AppState, post_id: i64) -> Result<Vec<ImageRef>, ApiError> {
    Ok(queries::get_images_for_post(state.db.pool(), post_id)
        .await?
        .into_iter()
        .map(|image| ImageRef {
            id: image.id,
            title: image.title,
        })
        .collect())
}

async fn list_item(state: &AppState, post: PostWithRefs) -> Result<PostListItem, ApiError> {
    let images = image_refs(state, post.id).await?;
    Ok(PostListItem {
        id: post.id,
        title: post.title,
        tag: post.tag,
        content: post.content,
        created_at: post.created_at,
        is_published: post.is_published,
        blog: BlogRef {
            id: post.blog_id,
            title: post.blog_title,
        },
        profile: OwnerRef {
            id: post.profile_id,
            username: post.username,
        },
        images,
    })
}

async fn detail_out(state: &AppState, post: Post) -> Result<PostDetail, ApiError> {
    let images = image_refs(state, post.id).await?;
    Ok(PostDetail {
        id: post.id,
        title: post.title,
        tag: post.tag,
        blog: post.blog_id,
        profile: post.profile_id,
        content: post.content,
        created_at: post.created_at,
        is_published: post.is_published,
        published_at: post.published_at,
        images,
    })
}

#[derive(Debug, Deserialize)]
pub struct CreatePost {
    title: Option<String>,
    tag: Option<String>,
    content: Option<String>,
    blog: Option<i64>,
}

/// POST /api/new-post/ - The target blog must belong to the caller.
pub async fn create(
    State(state): State<AppState>,
    RequireApiUser(caller): RequireApiUser,
    ApiJson(body): ApiJson<CreatePost>,
) -> Result<Response, ApiError> {
    let pool = state.db.pool();
    let title = body.title.unwrap_or_default().trim().to_string();
    let tag = body.tag.unwrap_or_default().trim().to_string();
    let content = body.content.unwrap_or_default();

    let mut errors = validate_post(&title, &tag, &content);
    let profile_id = caller_profile(pool, &caller).await?;
    match body.blog {
        None => errors.add("blog", "This field is required."),
        Some(blog_id) => match queries::get_blog(pool, blog_id).await? {
            None => errors.add(
                "blog",
                format!("Invalid pk \"{blog_id}\" - object does not exist."),
            ),
            Some(blog) if Some(blog.profile_id) != profile_id => {
                errors.add("blog", "You can only add posts to your own blogs.");
            }
            Some(_) => {}
        },
    }
    errors.into_result()?;

    let (Some(blog_id), Some(profile_id)) = (body.blog, profile_id) else {
        return Err(ApiError::field("blog", "This field is required."));
    };
    let id = queries::create_post(
        pool,
        &NewPost {
            blog_id,
            profile_id,
            title: title.clone(),
            tag: tag.clone(),
            content: content.clone(),
        },
    )
    .await?;
    tracing::info!(post_id = id, blog_id, "Post created through the API");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": id,
            "title": title,
            "tag": tag,
            "blog": blog_id,
            "content": content,
        })),
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct PostListQuery {
    page: Option<String>,
    search: Option<String>,
    username: Option<String>,
    tag: Option<String>,
    title: Option<String>,
}

/// GET /api/posts/ - Published posts, plus the caller's own drafts.
pub async fn list(
    State(state): State<AppState>,
    MaybeApiUser(caller): MaybeApiUser,
    Query(query): Query<PostListQuery>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Page<PostListItem>>, ApiError> {
    let pool = state.db.pool();
    let owner_profile_id = match &caller {
        Some(user) => caller_profile(pool, user).await?,
        None => None,
    };
    let filter = PostFilter {
        search: query.search,
        username: query.username,
        tag: query.tag,
        title: query.title,
        published_only: true,
        owner_profile_id,
    };

    let count = queries::count_posts(pool, &filter).await?;
    let page = PageRequest::parse(query.page.as_deref(), state.config.page_size)?.resolve(count)?;
    let posts = queries::list_posts(pool, &filter, page.size, page.offset()).await?;

    let mut results = Vec::with_capacity(posts.len());
    for post in posts {
        results.push(list_item(&state, post).await?);
    }
    let url = absolute_url(&state, "/api/posts/");
    Ok(Json(page.into_page(count, results, &url, raw.as_deref())))
}

/// Load a post and check `caller` may use `method` on it.
async fn authorized_post(
    state: &AppState,
    caller: Option<&User>,
    method: &Method,
    id: i64,
) -> Result<Post, ApiError> {
    let pool = state.db.pool();
    let post = queries::get_post(pool, id).await?.ok_or(ApiError::NotFound)?;
    let viewer = match caller {
        Some(user) => caller_profile(pool, user).await?,
        None => None,
    };
    if can_access_post(method, viewer, &post) {
        Ok(post)
    } else if caller.is_none() {
        Err(ApiError::Unauthorized)
    } else {
        Err(ApiError::Forbidden)
    }
}

/// GET /api/post/:id/
pub async fn detail(
    State(state): State<AppState>,
    method: Method,
    MaybeApiUser(caller): MaybeApiUser,
    Path(id): Path<i64>,
) -> Result<Json<PostDetail>, ApiError> {
    let post = authorized_post(&state, caller.as_ref(), &method, id).await?;
    Ok(Json(detail_out(&state, post).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePost {
    title: Option<String>,
    tag: Option<String>,
    content: Option<String>,
    is_published: Option<bool>,
}

fn validate_update(method: &Method, body: &UpdatePost) -> FormErrors {
    if *method == Method::PUT {
        return validate_post(
            body.title.as_deref().unwrap_or_default().trim(),
            body.tag.as_deref().unwrap_or_default().trim(),
            body.content.as_deref().unwrap_or_default(),
        );
    }
    let mut errors = FormErrors::new();
    if let Some(title) = &body.title {
        check_required(&mut errors, "title", title, Some(limits::POST_TITLE));
    }
    if let Some(tag) = &body.tag {
        check_required(&mut errors, "tag", tag, Some(limits::POST_TAG));
    }
    if let Some(content) = &body.content {
        check_required(&mut errors, "content", content, None);
    }
    errors
}

/// PUT/PATCH /api/post/:id/
pub async fn update(
    State(state): State<AppState>,
    method: Method,
    RequireApiUser(caller): RequireApiUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdatePost>,
) -> Result<Json<PostDetail>, ApiError> {
    let pool = state.db.pool();
    let post = authorized_post(&state, Some(&caller), &method, id).await?;
    validate_update(&method, &body).into_result()?;

    queries::update_post(
        pool,
        post.id,
        &PostChanges {
            title: body.title.map(|t| t.trim().to_string()),
            tag: body.tag.map(|t| t.trim().to_string()),
            content: body.content,
        },
    )
    .await?;

    match body.is_published {
        Some(true) if !post.is_published => queries::publish_post(pool, post.id).await?,
        Some(false) if post.is_published => queries::archive_post(pool, post.id).await?,
        _ => {}
    }
    tracing::info!(post_id = post.id, "Post updated through the API");

    let post = queries::get_post(pool, post.id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(detail_out(&state, post).await?))
}

/// DELETE /api/post/:id/
pub async fn destroy(
    State(state): State<AppState>,
    method: Method,
    RequireApiUser(caller): RequireApiUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let pool = state.db.pool();
    let post = authorized_post(&state, Some(&caller), &method, id).await?;

    let files = queries::get_image_files_for_post(pool, post.id).await?;
    queries::delete_post(pool, post.id).await?;
    release_media(&state, &files).await;

    tracing::info!(post_id = post.id, "Post deleted through the API");
    Ok(StatusCode::NO_CONTENT)
}
