//! Pagination component for navigating through multi-page listings.

use maud::{html, Markup, Render};

/// Page navigation with previous/next links and nearby page numbers.
///
/// Pages are 1-indexed, matching the `?page=N` query parameter.
/// Nothing is rendered when there is a single page.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub base_url: String,
}

impl Pagination {
    #[must_use]
    pub fn new(current_page: u32, total_pages: u32, base_url: &str) -> Self {
        Self {
            current_page: current_page.max(1),
            total_pages,
            base_url: base_url.to_string(),
        }
    }

    fn build_url(&self, page: u32) -> String {
        if page > 1 {
            format!("{}?page={page}", self.base_url)
        } else {
            self.base_url.clone()
        }
    }

    #[must_use]
    pub fn should_display(&self) -> bool {
        self.total_pages > 1
    }
}

impl Render for Pagination {
    fn render(&self) -> Markup {
        if !self.should_display() {
            return html! {};
        }

        let current = self.current_page;
        let total = self.total_pages;
        let start = current.saturating_sub(2).max(1);
        let end = (current + 2).min(total);

        html! {
            nav class="pagination" {
                @if current > 1 {
                    a href=(self.build_url(current - 1)) { "\u{00ab} Previous" }
                } @else {
                    span class="disabled" { "\u{00ab} Previous" }
                }

                @for page in start..=end {
                    @if page == current {
                        span class="current" { (page) }
                    } @else {
                        a href=(self.build_url(page)) { (page) }
                    }
                }

                @if current < total {
                    a href=(self.build_url(current + 1)) { "Next \u{00bb}" }
                } @else {
                    span class="disabled" { "Next \u{00bb}" }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        let pagination = Pagination::new(1, 10, "/blogs/posts-latest/");
        assert_eq!(pagination.build_url(1), "/blogs/posts-latest/");
        assert_eq!(pagination.build_url(5), "/blogs/posts-latest/?page=5");
    }

    #[test]
    fn test_single_page_renders_nothing() {
        assert_eq!(Pagination::new(1, 1, "/").render().into_string(), "");
    }

    #[test]
    fn test_render_marks_current_page() {
        let html = Pagination::new(2, 3, "/x/").render().into_string();
        assert!(html.contains(r#"<span class="current">2</span>"#));
        assert!(html.contains(r#"<a href="/x/">1</a>"#));
        assert!(html.contains(r#"<a href="/x/?page=3">Next »</a>"#));
    }
}
