//! Base layout components for the web UI.
//!
//! This module provides the main page layout structure including
//! the HTML skeleton, navigation, and footer.

use maud::{html, Markup, DOCTYPE};

use crate::auth::CSRF_FIELD;
use crate::db::User;

/// The signed-in visitor as seen by the navigation bar.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user: User,
    pub profile_id: Option<i64>,
    pub csrf_token: String,
}

/// Base page layout builder.
///
/// ```ignore
/// let content = html! { h1 { "Hello" } };
/// let page = BaseLayout::new("Latest posts", viewer.as_ref()).render(content);
/// ```
#[derive(Debug, Clone)]
pub struct BaseLayout<'a> {
    title: &'a str,
    viewer: Option<&'a Viewer>,
}

impl<'a> BaseLayout<'a> {
    /// Create a new base layout with the given page title and visitor.
    ///
    /// Pass `None` for anonymous visitors.
    #[must_use]
    pub fn new(title: &'a str, viewer: Option<&'a Viewer>) -> Self {
        Self { title, viewer }
    }

    /// Render the complete HTML page with the given content.
    #[must_use]
    pub fn render(self, content: Markup) -> Markup {
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="UTF-8";
                    meta name="viewport" content="width=device-width, initial-scale=1.0";
                    title { (self.title) " - JustBlog" }
                    link rel="stylesheet" href="/static/css/style.css";
                    link rel="alternate" type="application/rss+xml" title="JustBlog latest posts" href="/posts-feed/";
                }
                body {
                    (self.render_header())
                    main class="container" {
                        (content)
                    }
                    (Self::render_footer())
                }
            }
        }
    }

    fn render_header(&self) -> Markup {
        html! {
            header class="container" {
                nav {
                    ul {
                        li {
                            a href="/main/" {
                                strong class="site-logo" { "JustBlog" }
                            }
                        }
                    }
                    ul {
                        li { a href="/main/" { "Home" } }
                        li { a href="/blogs/posts-latest/" { "Latest posts" } }
                        li { a href="/main/about/" { "About" } }
                        li { a href="/main/contacts/" { "Contacts" } }
                        (self.render_auth_nav())
                    }
                }
            }
        }
    }

    fn render_auth_nav(&self) -> Markup {
        match self.viewer {
            Some(viewer) => html! {
                @if let Some(profile_id) = viewer.profile_id {
                    li { a href=(format!("/blogs/blog/{profile_id}/")) { "My blogs" } }
                    li { a href=(format!("/users/profile-details/{profile_id}/")) { (viewer.user.username) } }
                }
                li {
                    form action="/users/logout/" method="post" class="inline" {
                        input type="hidden" name=(CSRF_FIELD) value=(viewer.csrf_token);
                        button type="submit" class="btn outline" { "Log out" }
                    }
                }
            },
            None => html! {
                li { a href="/users/login/" { "Log in" } }
                li { a href="/users/get-started/" { "Get started" } }
            },
        }
    }

    fn render_footer() -> Markup {
        html! {
            footer class="container" {
                small {
                    "JustBlog | "
                    a href="/posts-feed/" { "RSS" }
                    " | "
                    a href="/main/contacts/" { "Contacts" }
                }
            }
        }
    }
}
