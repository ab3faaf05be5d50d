use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use super::routes::LATEST_POSTS_COUNT;
use super::{AppState, WebError};
use crate::db::{self as queries, parse_timestamp, Post, PostWithRefs};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts-feed/", get(feed_rss))
        .route("/sitemap-static.xml/", get(sitemap_static))
        .route("/sitemap-posts.xml/", get(sitemap_posts))
}

async fn feed_rss(State(state): State<AppState>) -> Result<Response, WebError> {
    let posts =
        queries::get_latest_published_posts(state.db.pool(), LATEST_POSTS_COUNT, 0).await?;
    let rss = generate_rss(&posts, &state.config.base_url);
    Ok((
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        rss,
    )
        .into_response())
}

async fn sitemap_static(State(state): State<AppState>) -> Response {
    xml_response(generate_static_sitemap(&state.config.base_url))
}

async fn sitemap_posts(State(state): State<AppState>) -> Result<Response, WebError> {
    let posts = queries::get_all_published_posts(state.db.pool()).await?;
    Ok(xml_response(generate_posts_sitemap(
        &posts,
        &state.config.base_url,
    )))
}

fn xml_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], body).into_response()
}

/// Generate the RSS 2.0 feed of the latest published posts.
pub fn generate_rss(posts: &[PostWithRefs], base_url: &str) -> String {
    let items: String = posts
        .iter()
        .map(|post| {
            let title = xml_escape(&post.title);
            let link = format!("{base_url}/blogs/post-detail/{}/", post.id);
            let pub_date = post
                .published_at
                .as_deref()
                .and_then(parse_timestamp)
                .map(|t| t.to_rfc2822())
                .unwrap_or_default();

            format!(
                r#"    <item>
      <title>{title}</title>
      <link>{link}</link>
      <guid isPermaLink="true">{link}</guid>
      <description>{title}</description>
      <pubDate>{pub_date}</pubDate>
    </item>"#
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Posts</title>
    <link>{base_url}/blogs/posts-latest/</link>
    <description>The latest published posts</description>
    <language>en-us</language>
    <atom:link href="{base_url}/posts-feed/" rel="self" type="application/rss+xml"/>
{items}
  </channel>
</rss>"#
    )
}

fn url_entry(loc: &str, lastmod: Option<&str>) -> String {
    let lastmod = lastmod
        .and_then(parse_timestamp)
        .map(|t| format!("\n    <lastmod>{}</lastmod>", t.format("%Y-%m-%d")))
        .unwrap_or_default();
    format!("  <url>\n    <loc>{}</loc>{lastmod}\n  </url>", xml_escape(loc))
}

fn urlset(entries: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{}
</urlset>"#,
        entries.join("\n")
    )
}

/// Sitemap of the static pages.
pub fn generate_static_sitemap(base_url: &str) -> String {
    let entries: Vec<String> = ["/main/", "/main/about/", "/main/contacts/"]
        .iter()
        .map(|path| url_entry(&format!("{base_url}{path}"), None))
        .collect();
    urlset(&entries)
}

/// Sitemap of published posts, dated by publication.
pub fn generate_posts_sitemap(posts: &[Post], base_url: &str) -> String {
    let entries: Vec<String> = posts
        .iter()
        .map(|post| {
            url_entry(
                &format!("{base_url}/blogs/post-detail/{}/", post.id),
                post.published_at.as_deref(),
            )
        })
        .collect();
    urlset(&entries)
}

/// Escape XML special characters
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn published(id: i64, title: &str) -> PostWithRefs {
        PostWithRefs {
            id,
            blog_id: 1,
            profile_id: 1,
            title: title.to_string(),
            tag: "t".to_string(),
            content: "c".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            is_published: true,
            published_at: Some("2024-01-02T03:04:05Z".to_string()),
            blog_title: "b".to_string(),
            username: "ann".to_string(),
        }
    }

    #[test]
    fn test_generate_rss_empty() {
        let rss = generate_rss(&[], "https://example.com");
        assert!(rss.contains("<?xml version="));
        assert!(rss.contains("<rss version=\"2.0\""));
        assert!(rss.contains("<title>Posts</title>"));
        assert!(rss.contains("The latest published posts"));
    }

    #[test]
    fn test_generate_rss_items() {
        let rss = generate_rss(&[published(7, "Fish & chips")], "https://example.com");
        assert!(rss.contains("<title>Fish &amp; chips</title>"));
        assert!(rss.contains("<link>https://example.com/blogs/post-detail/7/</link>"));
        assert!(rss.contains("<pubDate>Tue, 2 Jan 2024 03:04:05 +0000</pubDate>"));
    }

    #[test]
    fn test_static_sitemap() {
        let xml = generate_static_sitemap("https://example.com");
        assert!(xml.contains("<loc>https://example.com/main/</loc>"));
        assert!(xml.contains("<loc>https://example.com/main/about/</loc>"));
        assert!(xml.contains("<loc>https://example.com/main/contacts/</loc>"));
    }

    #[test]
    fn test_posts_sitemap_lastmod() {
        let post = published(3, "x").post();
        let xml = generate_posts_sitemap(&[post], "https://example.com");
        assert!(xml.contains("<loc>https://example.com/blogs/post-detail/3/</loc>"));
        assert!(xml.contains("<lastmod>2024-01-02</lastmod>"));
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("<script>"), "&lt;script&gt;");
        assert_eq!(xml_escape("a & b"), "a &amp; b");
    }
}
