//! Profile pages: the owner's private view, the public view and the edit form.

use maud::{html, Markup, Render};

use crate::components::{
    BaseLayout, Button, Checkbox, CsrfField, FieldErrors, Form, FormGroup, Input, TextArea, Viewer,
};
use crate::db::{limits, BlogWithOwner, ProfileWithUser};
use crate::media::media_url;
use crate::web::forms::FormErrors;

/// Values shown in the profile edit form.
#[derive(Debug, Clone, Default)]
pub struct ProfileFormValues {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub bio: String,
    pub birth_date: String,
}

impl ProfileFormValues {
    #[must_use]
    pub fn from_profile(profile: &ProfileWithUser) -> Self {
        Self {
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            email: profile.email.clone(),
            bio: profile.bio.clone(),
            birth_date: profile.birth_date.clone().unwrap_or_default(),
        }
    }
}

fn avatar(profile: &ProfileWithUser) -> Markup {
    html! {
        @if let Some(file) = &profile.avatar {
            img class="avatar" src=(media_url(file)) alt=(format!("{} avatar", profile.username));
        } @else {
            div class="avatar avatar-empty" { (profile.username.chars().next().unwrap_or('?').to_uppercase()) }
        }
    }
}

fn blog_links(blogs: &[BlogWithOwner]) -> Markup {
    html! {
        @if blogs.is_empty() {
            p class="empty" { "No blogs yet." }
        } @else {
            ul class="blog-links" {
                @for blog in blogs {
                    li {
                        a href=(format!("/blogs/blog-detail/{}/", blog.id)) { (blog.title) }
                        " "
                        small { "(" (blog.post_count) " posts)" }
                    }
                }
            }
        }
    }
}

/// The owner's own profile page.
#[must_use]
pub fn profile_details_page(
    viewer: &Viewer,
    profile: &ProfileWithUser,
    blogs: &[BlogWithOwner],
) -> Markup {
    let edit_url = format!("/users/profile-update/{}/", profile.id);
    let public_url = format!("/users/profile-public/{}/", profile.id);
    let age = profile.profile().age();

    let content = html! {
        article class="profile" {
            header class="profile-header" {
                (avatar(profile))
                div {
                    h1 { (profile.display_name()) }
                    p { small { "@" (profile.username) } }
                }
            }

            dl class="profile-fields" {
                dt { "First name" } dd { (profile.first_name) }
                dt { "Last name" } dd { (profile.last_name) }
                dt { "Email" } dd { (profile.email) }
                dt { "Age" }
                dd {
                    @if let Some(age) = age { (age) } @else { "Not set" }
                }
                dt { "Bio" } dd { (profile.bio) }
            }

            div class="actions" {
                (Button::primary("Edit profile").href(&edit_url))
                (Button::outline("Public page").href(&public_url))
            }
        }

        section {
            h2 { "My blogs" }
            (blog_links(blogs))
            (Button::primary("New blog").href("/blogs/new-blog/"))
        }
    };

    BaseLayout::new("My profile", Some(viewer)).render(content)
}

/// The profile as anyone sees it.
#[must_use]
pub fn profile_public_page(
    viewer: Option<&Viewer>,
    profile: &ProfileWithUser,
    blogs: &[BlogWithOwner],
) -> Markup {
    let title = profile.display_name();

    let content = html! {
        article class="profile" {
            header class="profile-header" {
                (avatar(profile))
                div {
                    h1 { (title) }
                    p { small { "@" (profile.username) } }
                }
            }
            @if let Some(age) = profile.profile().age() {
                p { "Age: " (age) }
            }
            @if !profile.bio.is_empty() {
                p class="bio" { (profile.bio) }
            }
        }

        section {
            h2 { "Blogs" }
            (blog_links(blogs))
        }
    };

    BaseLayout::new(&title, viewer).render(content)
}

/// The profile edit form.
#[must_use]
pub fn profile_update_page(
    viewer: &Viewer,
    profile: &ProfileWithUser,
    values: &ProfileFormValues,
    errors: &FormErrors,
) -> Markup {
    let action = format!("/users/profile-update/{}/", profile.id);

    let fields = html! {
        (CsrfField(&viewer.csrf_token))
        (FieldErrors::new(errors.general()))
        (FormGroup::new(
            "First name",
            "first_name",
            Input::text("first_name")
                .id("first_name")
                .value(&values.first_name)
                .maxlength(limits::NAME)
                .render(),
        )
        .errors(errors.field("first_name")))
        (FormGroup::new(
            "Last name",
            "last_name",
            Input::text("last_name")
                .id("last_name")
                .value(&values.last_name)
                .maxlength(limits::NAME)
                .render(),
        )
        .errors(errors.field("last_name")))
        (FormGroup::new(
            "Email",
            "email",
            Input::email("email").id("email").value(&values.email).render(),
        )
        .errors(errors.field("email")))
        (FormGroup::new(
            "Date of birth",
            "birth_date",
            Input::date("birth_date")
                .id("birth_date")
                .value(&values.birth_date)
                .render(),
        )
        .errors(errors.field("birth_date")))
        (FormGroup::new(
            "Bio",
            "bio",
            TextArea::new("bio")
                .id("bio")
                .rows(5)
                .maxlength(limits::BIO)
                .value(&values.bio)
                .render(),
        )
        .errors(errors.field("bio")))
        @if profile.avatar.is_some() {
            div class="form-group" {
                (avatar(profile))
                (Checkbox::new("avatar_clear").value("true").label("Remove the current avatar"))
            }
        }
        (FormGroup::new(
            "Avatar",
            "avatar",
            Input::file("avatar")
                .id("avatar")
                .accept("image/png,image/jpeg")
                .render(),
        )
        .help("PNG or JPEG.")
        .errors(errors.field("avatar")))
        (Button::submit("Save"))
    };

    let content = html! {
        article {
            h1 { "Edit profile" }
            (Form::post(&action, fields).multipart())
        }
    };

    BaseLayout::new("Edit profile", Some(viewer)).render(content)
}
