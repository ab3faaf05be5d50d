use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Maximum lengths enforced by forms and the API.
pub mod limits {
    pub const USERNAME: usize = 150;
    pub const NAME: usize = 150;
    pub const BIO: usize = 256;
    pub const BLOG_TITLE: usize = 128;
    pub const BLOG_DESCRIPTION: usize = 256;
    pub const POST_TITLE: usize = 128;
    pub const POST_TAG: usize = 70;
    pub const IMAGE_TITLE: usize = 20;
}

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A cookie-backed web login.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub csrf_token: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub expires_at: String,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

/// A per-user key for the REST API.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApiToken {
    pub key: String,
    pub user_id: i64,
    pub created_at: String,
}

/// One-to-one extension of a user account.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub birth_date: Option<String>,
    pub bio: String,
    pub avatar: Option<String>,
}

impl Profile {
    /// Parsed birth date, if set and well formed.
    #[must_use]
    pub fn birth_date(&self) -> Option<NaiveDate> {
        self.birth_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }

    /// Age in whole years on `today`.
    #[must_use]
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        let born = self.birth_date()?;
        let had_birthday = (today.month(), today.day()) >= (born.month(), born.day());
        Some(today.year() - born.year() - i32::from(!had_birthday))
    }

    /// Age in whole years today (UTC).
    #[must_use]
    pub fn age(&self) -> Option<i32> {
        self.age_on(chrono::Utc::now().date_naive())
    }
}

/// A profile joined with the account fields shown next to it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProfileWithUser {
    pub id: i64,
    pub user_id: i64,
    pub birth_date: Option<String>,
    pub bio: String,
    pub avatar: Option<String>,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl ProfileWithUser {
    #[must_use]
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id,
            user_id: self.user_id,
            birth_date: self.birth_date.clone(),
            bio: self.bio.clone(),
            avatar: self.avatar.clone(),
        }
    }

    /// Full name, falling back to the username.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// A named collection of posts owned by one profile.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Blog {
    pub id: i64,
    pub profile_id: i64,
    pub title: String,
    pub description: String,
    pub created_at: String,
}

/// A blog joined with its owner's username and post count.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogWithOwner {
    pub id: i64,
    pub profile_id: i64,
    pub title: String,
    pub description: String,
    pub created_at: String,
    pub username: String,
    pub post_count: i64,
}

/// An article in a blog.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub blog_id: i64,
    pub profile_id: i64,
    pub title: String,
    pub tag: String,
    pub content: String,
    pub created_at: String,
    pub is_published: bool,
    pub published_at: Option<String>,
}

impl Post {
    /// Title cut to 80 characters for listings.
    #[must_use]
    pub fn short_title(&self) -> String {
        truncate_chars(&self.title, 80, "...")
    }

    /// Content cut to 100 characters for listings.
    #[must_use]
    pub fn short_content(&self) -> String {
        truncate_chars(&self.content, 100, "... ")
    }

    /// Tag words rendered as `#one#two`.
    #[must_use]
    pub fn hashtags(&self) -> String {
        format_hashtags(&self.tag)
    }
}

/// A post joined with the blog title and owner username.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostWithRefs {
    pub id: i64,
    pub blog_id: i64,
    pub profile_id: i64,
    pub title: String,
    pub tag: String,
    pub content: String,
    pub created_at: String,
    pub is_published: bool,
    pub published_at: Option<String>,
    pub blog_title: String,
    pub username: String,
}

impl PostWithRefs {
    #[must_use]
    pub fn post(&self) -> Post {
        Post {
            id: self.id,
            blog_id: self.blog_id,
            profile_id: self.profile_id,
            title: self.title.clone(),
            tag: self.tag.clone(),
            content: self.content.clone(),
            created_at: self.created_at.clone(),
            is_published: self.is_published,
            published_at: self.published_at.clone(),
        }
    }
}

/// A media attachment of a post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Image {
    pub id: i64,
    pub post_id: i64,
    pub title: String,
    pub file: String,
}

/// An image joined with the profile owning its post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImageWithOwner {
    pub id: i64,
    pub post_id: i64,
    pub title: String,
    pub file: String,
    pub owner_profile_id: i64,
}

impl ImageWithOwner {
    #[must_use]
    pub fn image(&self) -> Image {
        Image {
            id: self.id,
            post_id: self.post_id,
            title: self.title.clone(),
            file: self.file.clone(),
        }
    }
}

/// Data for inserting a new post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub blog_id: i64,
    pub profile_id: i64,
    pub title: String,
    pub tag: String,
    pub content: String,
}

/// Partial update of a user's own account fields.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Partial update of a profile. `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub bio: Option<String>,
    pub birth_date: Option<Option<String>>,
    pub avatar: Option<Option<String>>,
}

/// Partial update of a post's text fields.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub tag: Option<String>,
    pub content: Option<String>,
}

/// Filters shared by the profile listings.
#[derive(Debug, Clone, Default)]
pub struct ProfileFilter {
    pub search: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub birthday_after: Option<String>,
    pub birthday_before: Option<String>,
}

/// Filters shared by the blog listings.
#[derive(Debug, Clone, Default)]
pub struct BlogFilter {
    pub search: Option<String>,
    pub username: Option<String>,
    pub title: Option<String>,
    pub profile_id: Option<i64>,
}

/// Filters shared by the post listings.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub search: Option<String>,
    pub username: Option<String>,
    pub tag: Option<String>,
    pub title: Option<String>,
    pub published_only: bool,
    /// With `published_only`, still include this profile's own drafts.
    pub owner_profile_id: Option<i64>,
}

fn truncate_chars(text: &str, max: usize, suffix: &str) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}{suffix}")
    } else {
        text.to_string()
    }
}

/// Render whitespace-separated tag words as hashtags.
#[must_use]
pub fn format_hashtags(tag: &str) -> String {
    let parts: Vec<&str> = tag.split_whitespace().collect();
    if parts.is_empty() {
        return String::new();
    }
    let joined = format!("#{}", parts.join("#"));
    let mut cleaned = joined.replace("##", "#");
    while cleaned.contains("##") {
        cleaned = cleaned.replace("##", "#");
    }
    cleaned
}

/// Split a hashtag string into one `#tag` per entry, for line-by-line display.
#[must_use]
pub fn hashtag_lines(hashtags: &str) -> Vec<String> {
    hashtags
        .split('#')
        .filter(|part| !part.is_empty())
        .map(|part| format!("#{part}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str, tag: &str, content: &str) -> Post {
        Post {
            id: 1,
            blog_id: 1,
            profile_id: 1,
            title: title.to_string(),
            tag: tag.to_string(),
            content: content.to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            is_published: false,
            published_at: None,
        }
    }

    #[test]
    fn test_short_title() {
        assert_eq!(post("short", "", "").short_title(), "short");
        let long = "x".repeat(81);
        assert_eq!(post(&long, "", "").short_title(), format!("{}...", "x".repeat(80)));
    }

    #[test]
    fn test_short_content_counts_chars_not_bytes() {
        let content = "é".repeat(101);
        let short = post("t", "", &content).short_content();
        assert_eq!(short, format!("{}... ", "é".repeat(100)));
        assert_eq!(post("t", "", "brief").short_content(), "brief");
    }

    #[test]
    fn test_hashtags() {
        assert_eq!(format_hashtags("rust web"), "#rust#web");
        assert_eq!(format_hashtags("#rust  #web"), "#rust#web");
        assert_eq!(format_hashtags("single"), "#single");
        assert_eq!(format_hashtags("   "), "");
    }

    #[test]
    fn test_hashtag_lines() {
        assert_eq!(hashtag_lines("#rust#web"), vec!["#rust", "#web"]);
        assert!(hashtag_lines("").is_empty());
    }

    #[test]
    fn test_profile_age() {
        let profile = Profile {
            id: 1,
            user_id: 1,
            birth_date: Some("1992-08-12".to_string()),
            bio: String::new(),
            avatar: None,
        };
        let before_birthday = NaiveDate::from_ymd_opt(2024, 8, 11).unwrap();
        let on_birthday = NaiveDate::from_ymd_opt(2024, 8, 12).unwrap();
        assert_eq!(profile.age_on(before_birthday), Some(31));
        assert_eq!(profile.age_on(on_birthday), Some(32));

        let unset = Profile {
            birth_date: None,
            ..profile
        };
        assert_eq!(unset.age_on(on_birthday), None);
    }
}
