//! Ownership rules shared by the web pages and the API.

use axum::http::Method;

use crate::db::{Post, User};

/// GET, HEAD and OPTIONS never modify anything.
#[must_use]
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Whether `viewer` (a profile id, if any) owns a resource owned by `owner`.
#[must_use]
pub fn is_owner(viewer: Option<i64>, owner: i64) -> bool {
    viewer == Some(owner)
}

/// Owner-or-read-only access to a profile, blog or image.
#[must_use]
pub fn can_access(method: &Method, viewer: Option<i64>, owner: i64) -> bool {
    is_safe_method(method) || is_owner(viewer, owner)
}

/// Whether a post may be shown to `viewer`.
#[must_use]
pub fn can_view_post(viewer: Option<i64>, post: &Post) -> bool {
    post.is_published || is_owner(viewer, post.profile_id)
}

/// Owner-or-read-only access to a post; unpublished posts are owner only.
#[must_use]
pub fn can_access_post(method: &Method, viewer: Option<i64>, post: &Post) -> bool {
    if is_safe_method(method) {
        can_view_post(viewer, post)
    } else {
        is_owner(viewer, post.profile_id)
    }
}

/// Post editing is also open to administrators.
#[must_use]
pub fn can_edit_post(user: &User, viewer: Option<i64>, post: &Post) -> bool {
    user.is_admin || is_owner(viewer, post.profile_id)
}
