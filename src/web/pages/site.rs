//! Home, about and contacts pages.

use maud::{html, Markup};

use super::post::post_card;
use crate::components::{BaseLayout, Button, Viewer};
use crate::db::PostWithRefs;

/// Render the home page with the latest published posts.
#[must_use]
pub fn index_page(viewer: Option<&Viewer>, posts: &[PostWithRefs]) -> Markup {
    let content = html! {
        section class="hero" {
            h1 { "JustBlog" }
            p { "Write, publish and share your blogs." }
            @if viewer.is_none() {
                (Button::primary("Get started").href("/users/get-started/"))
            }
        }

        section {
            h2 { "Latest posts" }
            @if posts.is_empty() {
                p class="empty" { "Nothing has been published yet." }
            } @else {
                @for post in posts {
                    (post_card(post))
                }
                p { a href="/blogs/posts-latest/" { "All latest posts" } }
            }
        }
    };

    BaseLayout::new("Home", viewer).render(content)
}

#[must_use]
pub fn about_page(viewer: Option<&Viewer>) -> Markup {
    let content = html! {
        article {
            h1 { "About" }
            p {
                "JustBlog is a small blogging platform. Every account gets a profile, "
                "any number of blogs and posts with pictures."
            }
            p {
                "Posts stay private until their author publishes them. Published posts appear "
                "on the home page, in the latest posts list and in the "
                a href="/posts-feed/" { "RSS feed" } "."
            }
            p {
                "Everything is also available through a JSON API under "
                code { "/api/" } "."
            }
        }
    };

    BaseLayout::new("About", viewer).render(content)
}

#[must_use]
pub fn contacts_page(viewer: Option<&Viewer>) -> Markup {
    let content = html! {
        article {
            h1 { "Contacts" }
            p { "Questions, bug reports and ideas are welcome." }
            ul {
                li { "E-mail: " a href="mailto:hello@justblog.example" { "hello@justblog.example" } }
            }
        }
    };

    BaseLayout::new("Contacts", viewer).render(content)
}
