//! Post pages and the post card shared by listings.

use maud::{html, Markup, Render};

use super::display_date;
use crate::components::{
    Alert, BaseLayout, Button, Checkbox, CsrfField, FieldErrors, Form, FormGroup, Input,
    Pagination, TextArea, Viewer,
};
use crate::db::{hashtag_lines, limits, BlogWithOwner, Image, PostWithRefs};
use crate::media::media_url;
use crate::web::forms::FormErrors;

const IMAGE_ACCEPT: &str = "image/png,image/jpeg";

/// Values shown in the post create/edit form.
#[derive(Debug, Clone, Default)]
pub struct PostFormValues {
    pub title: String,
    pub tag: String,
    pub content: String,
}

/// Published/draft marker shown to the owner.
#[must_use]
pub fn post_status(is_published: bool) -> Markup {
    html! {
        @if is_published {
            mark class="status published" { "Published" }
        } @else {
            mark class="status draft" { "Not published" }
        }
    }
}

fn hashtags(tag_line: &str) -> Markup {
    html! {
        p class="hashtags" {
            @for tag in hashtag_lines(tag_line) {
                span class="hashtag" { (tag) }
                br;
            }
        }
    }
}

/// A post summary for listings.
#[must_use]
pub fn post_card(post: &PostWithRefs) -> Markup {
    let inner = post.post();
    html! {
        article class="post-card" {
            h3 { a href=(format!("/blogs/post-detail/{}/", post.id)) { (inner.short_title()) } }
            p { (inner.short_content()) }
            small {
                (inner.hashtags())
                " · "
                a href=(format!("/blogs/blog-detail/{}/", post.blog_id)) { (post.blog_title) }
                " by "
                a href=(format!("/users/profile-public/{}/", post.profile_id)) { (post.username) }
                @if let Some(published_at) = &post.published_at {
                    " · " (display_date(published_at))
                }
            }
        }
    }
}

fn post_fields(values: &PostFormValues, errors: &FormErrors) -> Markup {
    html! {
        (FormGroup::new(
            "Title",
            "title",
            Input::text("title")
                .id("title")
                .value(&values.title)
                .maxlength(limits::POST_TITLE)
                .render(),
        )
        .errors(errors.field("title")))
        (FormGroup::new(
            "Tags",
            "tag",
            Input::text("tag")
                .id("tag")
                .value(&values.tag)
                .maxlength(limits::POST_TAG)
                .render(),
        )
        .help("Words separated by spaces, shown as #hashtags.")
        .errors(errors.field("tag")))
        (FormGroup::new(
            "Post content",
            "content",
            TextArea::new("content")
                .id("content")
                .rows(10)
                .value(&values.content)
                .render(),
        )
        .errors(errors.field("content")))
    }
}

fn image_input(errors: &FormErrors) -> Markup {
    FormGroup::new(
        "Images",
        "images",
        Input::file("images")
            .id("images")
            .accept(IMAGE_ACCEPT)
            .multiple()
            .render(),
    )
    .help("PNG or JPEG, any number of files.")
    .errors(errors.field("images"))
    .render()
}

/// Form for a new post, with a second form for a CSV import.
#[must_use]
pub fn new_post_page(
    viewer: &Viewer,
    blog: &BlogWithOwner,
    values: &PostFormValues,
    errors: &FormErrors,
) -> Markup {
    let action = format!("/blogs/new-post/{}/", blog.id);

    let post_form = html! {
        (CsrfField(&viewer.csrf_token))
        (FieldErrors::new(errors.general()))
        (post_fields(values, errors))
        (image_input(errors))
        (Button::submit("Create post"))
    };

    let import_form = html! {
        (CsrfField(&viewer.csrf_token))
        (FormGroup::new(
            "CSV file",
            "csv_file",
            Input::file("file").id("csv_file").accept(".csv,text/csv").required().render(),
        )
        .help("One post per row: title,tag,content. No header row.")
        .errors(errors.field("file")))
        (Button::secondary("Import posts").r#type("submit"))
    };

    let content = html! {
        article {
            h1 { "New post in " (blog.title) }
            (Form::post(&action, post_form).multipart())
        }
        article {
            h2 { "Import posts from CSV" }
            (Form::post(&action, import_form).multipart())
        }
    };

    BaseLayout::new("New post", Some(viewer)).render(content)
}

/// A single post with its images.
#[must_use]
pub fn post_detail_page(
    viewer: Option<&Viewer>,
    post: &PostWithRefs,
    images: &[Image],
    can_edit: bool,
    is_owner: bool,
) -> Markup {
    let content = html! {
        article class="post" {
            header {
                h1 { (post.title) }
                p {
                    a href=(format!("/blogs/blog-detail/{}/", post.blog_id)) { (post.blog_title) }
                    " by "
                    a href=(format!("/users/profile-public/{}/", post.profile_id)) { (post.username) }
                }
                small {
                    "Created " (display_date(&post.created_at))
                    @if let Some(published_at) = &post.published_at {
                        " · published " (display_date(published_at))
                    }
                }
                @if is_owner {
                    (post_status(post.is_published))
                }
            }

            (hashtags(&post.post().hashtags()))

            div class="post-content" style="white-space: pre-line" { (post.content) }

            @if !images.is_empty() {
                div class="post-images" {
                    @for image in images {
                        figure {
                            img src=(media_url(&image.file)) alt=(image.title);
                            figcaption { (image.title) }
                        }
                    }
                }
            }

            @if let Some(viewer) = viewer.filter(|_| can_edit || is_owner) {
                footer class="actions" {
                    @if can_edit {
                        (Button::outline("Edit").href(&format!("/blogs/post-edit/{}/", post.id)))
                    }
                    @if is_owner {
                        (Form::post(
                            &format!("/blogs/publish-archive/{}/", post.id),
                            html! {
                                (CsrfField(&viewer.csrf_token))
                                @if post.is_published {
                                    (Button::secondary("Archive").r#type("submit"))
                                } @else {
                                    (Button::submit("Publish"))
                                }
                            },
                        )
                        .class("inline"))
                        (Button::danger("Delete").href(&format!("/blogs/post-delete/{}/", post.id)))
                    }
                }
            }
        }
    };

    BaseLayout::new(&post.title, viewer).render(content)
}

/// Edit form for a post, with image removal checkboxes.
#[must_use]
pub fn post_edit_page(
    viewer: &Viewer,
    post: &PostWithRefs,
    images: &[Image],
    values: &PostFormValues,
    errors: &FormErrors,
) -> Markup {
    let action = format!("/blogs/post-edit/{}/", post.id);

    let fields = html! {
        (CsrfField(&viewer.csrf_token))
        (FieldErrors::new(errors.general()))
        (post_fields(values, errors))
        @if !images.is_empty() {
            fieldset class="current-images" {
                legend { "Current images" }
                @for image in images {
                    div class="image-choice" {
                        img src=(media_url(&image.file)) alt=(image.title) width="120";
                        (Checkbox::new("remove_image").value(&image.id.to_string()).label("Remove"))
                    }
                }
            }
        }
        (image_input(errors))
        (Button::submit("Save"))
    };

    let content = html! {
        article {
            h1 { "Edit post" }
            (Form::post(&action, fields).multipart())
        }
    };

    BaseLayout::new("Edit post", Some(viewer)).render(content)
}

/// Confirmation page for deleting a post.
#[must_use]
pub fn post_delete_page(viewer: &Viewer, post: &PostWithRefs) -> Markup {
    let action = format!("/blogs/post-delete/{}/", post.id);
    let cancel = format!("/blogs/post-detail/{}/", post.id);

    let fields = html! {
        (CsrfField(&viewer.csrf_token))
        (Button::danger("Yes, delete").r#type("submit"))
        (Button::outline("Cancel").href(&cancel))
    };

    let content = html! {
        article {
            h1 { "Delete post" }
            p { "Delete \"" (post.title) "\"? This cannot be undone." }
            (Form::post(&action, fields))
        }
    };

    BaseLayout::new("Delete post", Some(viewer)).render(content)
}

/// Published posts, newest first.
#[must_use]
pub fn latest_posts_page(
    viewer: Option<&Viewer>,
    posts: &[PostWithRefs],
    pagination: &Pagination,
) -> Markup {
    let content = html! {
        h1 { "Latest posts" }
        @if posts.is_empty() {
            (Alert::info("Nothing has been published yet."))
        }
        @for post in posts {
            (post_card(post))
        }
        (pagination)
    };

    BaseLayout::new("Latest posts", viewer).render(content)
}
