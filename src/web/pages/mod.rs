//! Maud-based page templates for the web UI.
//!
//! Each module renders complete pages through [`BaseLayout`](crate::components::BaseLayout).

pub mod account;
pub mod blog;
pub mod post;
pub mod profile;
pub mod site;

pub use account::{get_started_page, login_page, RegisterValues};
pub use blog::{
    blog_delete_page, blog_detail_page, blog_form_page, blog_list_page, BlogFormValues,
};
pub use post::{
    latest_posts_page, new_post_page, post_delete_page, post_detail_page, post_edit_page,
    PostFormValues,
};
pub use profile::{
    profile_details_page, profile_public_page, profile_update_page, ProfileFormValues,
};
pub use site::{about_page, contacts_page, index_page};

use crate::db::parse_timestamp;

/// Human-readable form of a stored timestamp.
#[must_use]
pub fn display_date(timestamp: &str) -> String {
    parse_timestamp(timestamp).map_or_else(
        || timestamp.to_string(),
        |t| t.format("%B %-d, %Y %H:%M").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_date() {
        assert_eq!(display_date("2024-03-05T07:08:09Z"), "March 5, 2024 07:08");
        assert_eq!(display_date("not a date"), "not a date");
    }
}
