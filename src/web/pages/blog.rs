//! Blog pages.

use maud::{html, Markup, Render};

use super::display_date;
use super::post::post_status;
use crate::components::{
    BaseLayout, Button, CsrfField, FieldErrors, Form, FormGroup, Input, TextArea, Viewer,
};
use crate::db::{limits, BlogWithOwner, Post, ProfileWithUser};
use crate::web::forms::FormErrors;

/// Values shown in the blog create/edit form.
#[derive(Debug, Clone, Default)]
pub struct BlogFormValues {
    pub title: String,
    pub description: String,
}

/// All blogs of one profile.
#[must_use]
pub fn blog_list_page(
    viewer: Option<&Viewer>,
    owner: &ProfileWithUser,
    blogs: &[BlogWithOwner],
    is_owner: bool,
) -> Markup {
    let title = if is_owner {
        "My blogs".to_string()
    } else {
        format!("Blogs by {}", owner.username)
    };

    let content = html! {
        h1 { (title) }
        @if is_owner {
            (Button::primary("New blog").href("/blogs/new-blog/"))
        }
        @if blogs.is_empty() {
            p class="empty" { "No blogs yet." }
        }
        @for blog in blogs {
            article class="blog-card" {
                h2 { a href=(format!("/blogs/blog-detail/{}/", blog.id)) { (blog.title) } }
                p { (blog.description) }
                small { (blog.post_count) " posts, created " (display_date(&blog.created_at)) }
            }
        }
    };

    BaseLayout::new(&title, viewer).render(content)
}

/// Create or edit form for a blog.
#[must_use]
pub fn blog_form_page(
    viewer: &Viewer,
    heading: &str,
    action: &str,
    values: &BlogFormValues,
    errors: &FormErrors,
) -> Markup {
    let fields = html! {
        (CsrfField(&viewer.csrf_token))
        (FieldErrors::new(errors.general()))
        (FormGroup::new(
            "Title",
            "title",
            Input::text("title")
                .id("title")
                .value(&values.title)
                .maxlength(limits::BLOG_TITLE)
                .required()
                .render(),
        )
        .errors(errors.field("title")))
        (FormGroup::new(
            "Description",
            "description",
            TextArea::new("description")
                .id("description")
                .rows(5)
                .maxlength(limits::BLOG_DESCRIPTION)
                .value(&values.description)
                .required()
                .render(),
        )
        .errors(errors.field("description")))
        (Button::submit("Save"))
    };

    let content = html! {
        article {
            h1 { (heading) }
            (Form::post(action, fields))
        }
    };

    BaseLayout::new(heading, Some(viewer)).render(content)
}

/// A blog with its posts. Owners also see unpublished posts and the controls.
#[must_use]
pub fn blog_detail_page(
    viewer: Option<&Viewer>,
    blog: &BlogWithOwner,
    posts: &[Post],
    is_owner: bool,
) -> Markup {
    let edit_url = format!("/blogs/blog-edit/{}/", blog.id);
    let delete_url = format!("/blogs/blog-delete/{}/", blog.id);
    let new_post_url = format!("/blogs/new-post/{}/", blog.id);

    let content = html! {
        article class="blog" {
            header {
                h1 { (blog.title) }
                p {
                    "by "
                    a href=(format!("/users/profile-public/{}/", blog.profile_id)) { (blog.username) }
                    " · created " (display_date(&blog.created_at))
                }
                p { (blog.description) }
            }
            @if is_owner {
                div class="actions" {
                    (Button::primary("New post").href(&new_post_url))
                    (Button::outline("Edit").href(&edit_url))
                    (Button::danger("Delete").href(&delete_url))
                }
            }
        }

        section {
            h2 { "Posts" }
            @if posts.is_empty() {
                p class="empty" { "No posts yet." }
            }
            @for post in posts {
                article class="post-card" {
                    h3 { a href=(format!("/blogs/post-detail/{}/", post.id)) { (post.short_title()) } }
                    @if is_owner {
                        (post_status(post.is_published))
                    }
                    p { (post.short_content()) }
                    small { (post.hashtags()) " · " (display_date(&post.created_at)) }
                }
            }
        }
    };

    BaseLayout::new(&blog.title, viewer).render(content)
}

/// Confirmation page for deleting a blog.
#[must_use]
pub fn blog_delete_page(viewer: &Viewer, blog: &BlogWithOwner) -> Markup {
    let action = format!("/blogs/blog-delete/{}/", blog.id);
    let cancel = format!("/blogs/blog-detail/{}/", blog.id);

    let fields = html! {
        (CsrfField(&viewer.csrf_token))
        (Button::danger("Yes, delete").r#type("submit"))
        (Button::outline("Cancel").href(&cancel))
    };

    let content = html! {
        article {
            h1 { "Delete blog" }
            p {
                "Delete \"" (blog.title) "\" and its " (blog.post_count)
                " posts? This cannot be undone."
            }
            (Form::post(&action, fields))
        }
    };

    BaseLayout::new("Delete blog", Some(viewer)).render(content)
}
