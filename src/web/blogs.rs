//! Blog and post pages.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::Method,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;

use super::forms::{image_title_from_file_name, validate_blog, validate_post, FormErrors};
use super::multipart::{MultipartForm, UploadedFile};
use super::pages::{self, BlogFormValues, PostFormValues};
use super::{check_csrf, maybe_viewer, profile_id_of, release_media, viewer_for, AppState, WebError};
use crate::auth::{login_redirect, CurrentUser, MaybeUser, RequireUser, CSRF_FIELD};
use crate::components::Pagination;
use crate::db::{self as queries, BlogWithOwner, NewPost, PostChanges, PostWithRefs};
use crate::import::{import_posts, ImportError};
use crate::media::{validate_image, MediaKind};
use crate::permissions::{can_access, can_edit_post, can_view_post, is_owner};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blogs/blog/:profile_id/", get(blog_list))
        .route("/blogs/new-blog/", get(new_blog_page).post(new_blog_post))
        .route("/blogs/blog-detail/:id/", get(blog_detail))
        .route("/blogs/blog-edit/:id/", get(blog_edit_page).post(blog_edit_post))
        .route(
            "/blogs/blog-delete/:id/",
            get(blog_delete_page).post(blog_delete_post),
        )
        .route(
            "/blogs/new-post/:blog_id/",
            get(new_post_page).post(new_post_post),
        )
        .route("/blogs/post-detail/:id/", get(post_detail))
        .route("/blogs/post-edit/:id/", get(post_edit_page).post(post_edit_post))
        .route(
            "/blogs/post-delete/:id/",
            get(post_delete_page).post(post_delete_post),
        )
        .route("/blogs/publish-archive/:id/", post(publish_archive))
        .route("/blogs/posts-latest/", get(posts_latest))
}

fn html_response(markup: maud::Markup) -> Response {
    Html(markup.into_string()).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CsrfForm {
    csrf_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BlogForm {
    csrf_token: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

impl BlogForm {
    fn values(&self) -> BlogFormValues {
        BlogFormValues {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<String>,
}

/// Page number from `?page=`, clamped to `1..=total_pages`. Anything that
/// is not a number means the first page.
fn clamp_page(raw: Option<&str>, total_pages: u32) -> u32 {
    match raw.map(str::trim).and_then(|p| p.parse::<i64>().ok()) {
        None => 1,
        Some(n) => u32::try_from(n.clamp(1, i64::from(total_pages))).unwrap_or(1),
    }
}

/// The caller's profile, created on first use for accounts made without one.
async fn ensure_profile(state: &AppState, current: &CurrentUser) -> Result<i64, WebError> {
    let pool = state.db.pool();
    match profile_id_of(pool, current.user.id).await? {
        Some(id) => Ok(id),
        None => Ok(queries::create_profile(pool, current.user.id).await?),
    }
}

async fn load_blog(state: &AppState, id: i64) -> Result<BlogWithOwner, WebError> {
    queries::get_blog_with_owner(state.db.pool(), id)
        .await?
        .ok_or(WebError::NotFound)
}

/// Load a blog the caller must own.
async fn owned_blog(
    state: &AppState,
    current: &CurrentUser,
    id: i64,
) -> Result<BlogWithOwner, WebError> {
    let blog = load_blog(state, id).await?;
    let viewer_profile = profile_id_of(state.db.pool(), current.user.id).await?;
    if !is_owner(viewer_profile, blog.profile_id) {
        return Err(WebError::Forbidden);
    }
    Ok(blog)
}

async fn load_post(state: &AppState, id: i64) -> Result<PostWithRefs, WebError> {
    queries::get_post_with_refs(state.db.pool(), id)
        .await?
        .ok_or(WebError::NotFound)
}

/// Load a post the caller must own.
async fn owned_post(
    state: &AppState,
    current: &CurrentUser,
    id: i64,
) -> Result<PostWithRefs, WebError> {
    let post = load_post(state, id).await?;
    let viewer_profile = profile_id_of(state.db.pool(), current.user.id).await?;
    if !is_owner(viewer_profile, post.profile_id) {
        return Err(WebError::Forbidden);
    }
    Ok(post)
}

/// Validate every uploaded image before anything is stored.
fn check_images(files: &[&UploadedFile], errors: &mut FormErrors) {
    for file in files {
        if let Err(e) = validate_image(&file.data) {
            errors.add("images", format!("{}: {e}", file.file_name));
        }
    }
}

/// Store uploaded images and attach them to a post, titled by file name.
async fn attach_images(
    state: &AppState,
    post_id: i64,
    files: &[&UploadedFile],
) -> Result<(), WebError> {
    for file in files {
        let stored = state
            .media
            .save_image(MediaKind::PostImage, &file.data)
            .await?;
        let title = image_title_from_file_name(&file.file_name);
        queries::create_image(state.db.pool(), post_id, &title, stored.path()).await?;
    }
    Ok(())
}

fn post_values(form: &MultipartForm) -> PostFormValues {
    let field = |name: &str| form.text(name).unwrap_or_default().trim().to_string();
    PostFormValues {
        title: field("title"),
        tag: field("tag"),
        content: field("content"),
    }
}

// ========== Blogs ==========

/// GET /blogs/blog/:profile_id/
async fn blog_list(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    Path(profile_id): Path<i64>,
) -> Result<Response, WebError> {
    let pool = state.db.pool();
    let owner = queries::get_profile_with_user(pool, profile_id)
        .await?
        .ok_or(WebError::NotFound)?;
    let blogs = queries::get_blogs_for_profile(pool, profile_id).await?;

    let is_owner = current
        .as_ref()
        .is_some_and(|c| c.user.id == owner.user_id);
    let viewer = maybe_viewer(pool, current.as_ref()).await;
    Ok(html_response(pages::blog_list_page(
        viewer.as_ref(),
        &owner,
        &blogs,
        is_owner,
    )))
}

/// GET /blogs/new-blog/
async fn new_blog_page(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Response {
    let viewer = viewer_for(state.db.pool(), &current).await;
    html_response(pages::blog_form_page(
        &viewer,
        "New blog",
        "/blogs/new-blog/",
        &BlogFormValues::default(),
        &FormErrors::new(),
    ))
}

/// POST /blogs/new-blog/
async fn new_blog_post(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Form(form): Form<BlogForm>,
) -> Result<Response, WebError> {
    check_csrf(&current, form.csrf_token.as_deref())?;
    let values = form.values();

    let errors = validate_blog(&values.title, &values.description);
    if !errors.is_empty() {
        let viewer = viewer_for(state.db.pool(), &current).await;
        return Ok(html_response(pages::blog_form_page(
            &viewer,
            "New blog",
            "/blogs/new-blog/",
            &values,
            &errors,
        )));
    }

    let profile_id = ensure_profile(&state, &current).await?;
    let blog_id =
        queries::create_blog(state.db.pool(), profile_id, &values.title, &values.description)
            .await?;
    tracing::info!(blog_id, profile_id, "Created blog");

    Ok(Redirect::to(&format!("/blogs/blog-detail/{blog_id}/")).into_response())
}

/// GET /blogs/blog-detail/:id/ - Owners also see unpublished posts.
async fn blog_detail(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let pool = state.db.pool();
    let blog = load_blog(&state, id).await?;

    let viewer_profile = match &current {
        Some(c) => profile_id_of(pool, c.user.id).await?,
        None => None,
    };
    let owner = is_owner(viewer_profile, blog.profile_id);
    let posts = queries::get_posts_for_blog(pool, blog.id, owner).await?;

    let viewer = maybe_viewer(pool, current.as_ref()).await;
    Ok(html_response(pages::blog_detail_page(
        viewer.as_ref(),
        &blog,
        &posts,
        owner,
    )))
}

/// GET /blogs/blog-edit/:id/
async fn blog_edit_page(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let blog = owned_blog(&state, &current, id).await?;
    let viewer = viewer_for(state.db.pool(), &current).await;
    let values = BlogFormValues {
        title: blog.title.clone(),
        description: blog.description.clone(),
    };
    Ok(html_response(pages::blog_form_page(
        &viewer,
        "Edit blog",
        &format!("/blogs/blog-edit/{id}/"),
        &values,
        &FormErrors::new(),
    )))
}

/// POST /blogs/blog-edit/:id/
async fn blog_edit_post(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<i64>,
    Form(form): Form<BlogForm>,
) -> Result<Response, WebError> {
    let blog = owned_blog(&state, &current, id).await?;
    check_csrf(&current, form.csrf_token.as_deref())?;
    let values = form.values();

    let errors = validate_blog(&values.title, &values.description);
    if !errors.is_empty() {
        let viewer = viewer_for(state.db.pool(), &current).await;
        return Ok(html_response(pages::blog_form_page(
            &viewer,
            "Edit blog",
            &format!("/blogs/blog-edit/{id}/"),
            &values,
            &errors,
        )));
    }

    queries::update_blog(state.db.pool(), blog.id, &values.title, &values.description).await?;
    tracing::info!(blog_id = blog.id, "Updated blog");

    Ok(Redirect::to(&format!("/blogs/blog-detail/{}/", blog.id)).into_response())
}

/// GET /blogs/blog-delete/:id/ - Confirmation page.
async fn blog_delete_page(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let blog = owned_blog(&state, &current, id).await?;
    let viewer = viewer_for(state.db.pool(), &current).await;
    Ok(html_response(pages::blog_delete_page(&viewer, &blog)))
}

/// POST /blogs/blog-delete/:id/
async fn blog_delete_post(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<i64>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, WebError> {
    let blog = owned_blog(&state, &current, id).await?;
    check_csrf(&current, form.csrf_token.as_deref())?;

    let pool = state.db.pool();
    let files = queries::get_image_files_for_blog(pool, blog.id).await?;
    queries::delete_blog(pool, blog.id).await?;
    release_media(&state, &files).await;
    tracing::info!(blog_id = blog.id, "Deleted blog");

    Ok(Redirect::to(&format!("/blogs/blog/{}/", blog.profile_id)).into_response())
}

// ========== Posts ==========

/// GET /blogs/new-post/:blog_id/
async fn new_post_page(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(blog_id): Path<i64>,
) -> Result<Response, WebError> {
    let blog = owned_blog(&state, &current, blog_id).await?;
    let viewer = viewer_for(state.db.pool(), &current).await;
    Ok(html_response(pages::new_post_page(
        &viewer,
        &blog,
        &PostFormValues::default(),
        &FormErrors::new(),
    )))
}

/// POST /blogs/new-post/:blog_id/
///
/// A `file` upload imports posts from CSV; otherwise a single post is created
/// from the form fields together with its images.
async fn new_post_post(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(blog_id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, WebError> {
    let blog = owned_blog(&state, &current, blog_id).await?;
    let form = MultipartForm::read(multipart).await?;
    check_csrf(&current, form.text(CSRF_FIELD))?;
    let pool = state.db.pool();

    if let Some(csv_file) = form.file("file") {
        return match import_posts(pool, blog.id, blog.profile_id, &csv_file.data).await {
            Ok(created) => {
                tracing::info!(blog_id = blog.id, created, "Imported posts");
                Ok(Redirect::to(&format!("/blogs/blog-detail/{}/", blog.id)).into_response())
            }
            Err(ImportError::Database(e)) => Err(WebError::Internal(e)),
            Err(e) => {
                let mut errors = FormErrors::new();
                errors.add("file", format!("The file you tried to upload is invalid. {e}"));
                let viewer = viewer_for(pool, &current).await;
                Ok(html_response(pages::new_post_page(
                    &viewer,
                    &blog,
                    &PostFormValues::default(),
                    &errors,
                )))
            }
        };
    }

    let values = post_values(&form);
    let images: Vec<&UploadedFile> = form.files("images").collect();
    let mut errors = validate_post(&values.title, &values.tag, &values.content);
    check_images(&images, &mut errors);

    if !errors.is_empty() {
        let viewer = viewer_for(pool, &current).await;
        return Ok(html_response(pages::new_post_page(
            &viewer, &blog, &values, &errors,
        )));
    }

    let post_id = queries::create_post(
        pool,
        &NewPost {
            blog_id: blog.id,
            profile_id: blog.profile_id,
            title: values.title,
            tag: values.tag,
            content: values.content,
        },
    )
    .await?;
    attach_images(&state, post_id, &images).await?;
    tracing::info!(post_id, blog_id = blog.id, images = images.len(), "Created post");

    Ok(Redirect::to(&format!("/blogs/post-detail/{post_id}/")).into_response())
}

/// GET /blogs/post-detail/:id/ - Unpublished posts are shown to their owner only.
async fn post_detail(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let pool = state.db.pool();
    let post = load_post(&state, id).await?;

    let viewer_profile = match &current {
        Some(c) => profile_id_of(pool, c.user.id).await?,
        None => None,
    };
    if !can_view_post(viewer_profile, &post.post()) {
        return match current {
            None => Ok(login_redirect(&format!("/blogs/post-detail/{id}/"))),
            Some(_) => Err(WebError::Forbidden),
        };
    }

    let images = queries::get_images_for_post(pool, post.id).await?;
    let owner = is_owner(viewer_profile, post.profile_id);
    let can_edit = current
        .as_ref()
        .is_some_and(|c| can_edit_post(&c.user, viewer_profile, &post.post()));

    let viewer = maybe_viewer(pool, current.as_ref()).await;
    Ok(html_response(pages::post_detail_page(
        viewer.as_ref(),
        &post,
        &images,
        can_edit,
        owner,
    )))
}

/// Load a post the caller may edit (owner or admin).
async fn editable_post(
    state: &AppState,
    current: &CurrentUser,
    id: i64,
) -> Result<PostWithRefs, WebError> {
    let post = load_post(state, id).await?;
    let viewer_profile = profile_id_of(state.db.pool(), current.user.id).await?;
    if !can_edit_post(&current.user, viewer_profile, &post.post()) {
        return Err(WebError::Forbidden);
    }
    Ok(post)
}

/// GET /blogs/post-edit/:id/
async fn post_edit_page(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let post = editable_post(&state, &current, id).await?;
    let pool = state.db.pool();
    let images = queries::get_images_for_post(pool, post.id).await?;
    let viewer = viewer_for(pool, &current).await;
    let values = PostFormValues {
        title: post.title.clone(),
        tag: post.tag.clone(),
        content: post.content.clone(),
    };
    Ok(html_response(pages::post_edit_page(
        &viewer,
        &post,
        &images,
        &values,
        &FormErrors::new(),
    )))
}

/// POST /blogs/post-edit/:id/ - Update text, remove checked images, add new ones.
async fn post_edit_post(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, WebError> {
    let post = editable_post(&state, &current, id).await?;
    let form = MultipartForm::read(multipart).await?;
    check_csrf(&current, form.text(CSRF_FIELD))?;
    let pool = state.db.pool();

    let values = post_values(&form);
    let new_images: Vec<&UploadedFile> = form.files("images").collect();
    let mut errors = validate_post(&values.title, &values.tag, &values.content);
    check_images(&new_images, &mut errors);

    let current_images = queries::get_images_for_post(pool, post.id).await?;

    if !errors.is_empty() {
        let viewer = viewer_for(pool, &current).await;
        return Ok(html_response(pages::post_edit_page(
            &viewer,
            &post,
            &current_images,
            &values,
            &errors,
        )));
    }

    queries::update_post(
        pool,
        post.id,
        &PostChanges {
            title: Some(values.title),
            tag: Some(values.tag),
            content: Some(values.content),
        },
    )
    .await?;

    let remove: Vec<i64> = form
        .texts("remove_image")
        .iter()
        .filter_map(|v| v.parse().ok())
        .collect();
    let mut released = Vec::new();
    for image in current_images.iter().filter(|i| remove.contains(&i.id)) {
        queries::delete_image(pool, image.id).await?;
        released.push(image.file.clone());
    }
    attach_images(&state, post.id, &new_images).await?;
    release_media(&state, &released).await;

    tracing::info!(
        post_id = post.id,
        removed = released.len(),
        added = new_images.len(),
        "Updated post"
    );
    Ok(Redirect::to(&format!("/blogs/post-detail/{}/", post.id)).into_response())
}

/// GET /blogs/post-delete/:id/ - Confirmation page.
async fn post_delete_page(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let post = owned_post(&state, &current, id).await?;
    let viewer = viewer_for(state.db.pool(), &current).await;
    Ok(html_response(pages::post_delete_page(&viewer, &post)))
}

/// POST /blogs/post-delete/:id/
async fn post_delete_post(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<i64>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, WebError> {
    let post = owned_post(&state, &current, id).await?;
    check_csrf(&current, form.csrf_token.as_deref())?;

    let pool = state.db.pool();
    let files = queries::get_image_files_for_post(pool, post.id).await?;
    queries::delete_post(pool, post.id).await?;
    release_media(&state, &files).await;
    tracing::info!(post_id = post.id, "Deleted post");

    Ok(Redirect::to(&format!("/blogs/blog-detail/{}/", post.blog_id)).into_response())
}

/// POST /blogs/publish-archive/:id/
async fn publish_archive(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Path(id): Path<i64>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, WebError> {
    let post = load_post(&state, id).await?;
    let viewer_profile = profile_id_of(state.db.pool(), current.user.id).await?;
    if !can_access(&Method::POST, viewer_profile, post.profile_id) {
        return Err(WebError::Forbidden);
    }
    check_csrf(&current, form.csrf_token.as_deref())?;

    let published = queries::toggle_post_published(state.db.pool(), post.id).await?;
    tracing::info!(post_id = post.id, published, "Toggled post publication");

    Ok(Redirect::to(&format!("/blogs/post-detail/{}/", post.id)).into_response())
}

/// GET /blogs/posts-latest/
async fn posts_latest(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    Query(query): Query<PageQuery>,
) -> Result<Response, WebError> {
    let pool = state.db.pool();
    let per_page = i64::from(state.config.page_size);
    let total = queries::count_published_posts(pool).await?;
    let total_pages = u32::try_from(((total + per_page - 1) / per_page).max(1)).unwrap_or(u32::MAX);
    let page = clamp_page(query.page.as_deref(), total_pages);
    let offset = i64::from(page - 1) * per_page;

    let posts = queries::get_latest_published_posts(pool, per_page, offset).await?;
    let pagination = Pagination::new(page, total_pages, "/blogs/posts-latest/");

    let viewer = maybe_viewer(pool, current.as_ref()).await;
    Ok(html_response(pages::latest_posts_page(
        viewer.as_ref(),
        &posts,
        &pagination,
    )))
}
