//! Field validation shared by the HTML forms and the JSON API.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::db::limits;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Key for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Validation messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn extend(&mut self, field: &str, messages: Vec<String>) {
        for message in messages {
            self.add(field, message);
        }
    }

    /// Messages for one field (empty when the field is valid).
    #[must_use]
    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn general(&self) -> &[String] {
        self.field(NON_FIELD_ERRORS)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert into a `Result`, failing when any message was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, Vec<String>> {
        self.fields
    }
}

/// Check a required text field and its maximum length in characters.
pub fn check_required(errors: &mut FormErrors, field: &str, value: &str, max: Option<usize>) {
    if value.trim().is_empty() {
        errors.add(field, "This field is required.");
        return;
    }
    check_max_length(errors, field, value, max);
}

pub fn check_max_length(errors: &mut FormErrors, field: &str, value: &str, max: Option<usize>) {
    if let Some(max) = max {
        let len = value.chars().count();
        if len > max {
            errors.add(
                field,
                format!("Ensure this field has at most {max} characters (it has {len})."),
            );
        }
    }
}

/// Validate the fields of a blog.
#[must_use]
pub fn validate_blog(title: &str, description: &str) -> FormErrors {
    let mut errors = FormErrors::new();
    check_required(&mut errors, "title", title, Some(limits::BLOG_TITLE));
    check_required(
        &mut errors,
        "description",
        description,
        Some(limits::BLOG_DESCRIPTION),
    );
    errors
}

/// Validate the text fields of a post.
#[must_use]
pub fn validate_post(title: &str, tag: &str, content: &str) -> FormErrors {
    let mut errors = FormErrors::new();
    check_required(&mut errors, "title", title, Some(limits::POST_TITLE));
    check_required(&mut errors, "tag", tag, Some(limits::POST_TAG));
    check_required(&mut errors, "content", content, None);
    errors
}

/// Validate an optional e-mail address. Empty means unset.
pub fn check_email(errors: &mut FormErrors, field: &str, email: &str) {
    let email = email.trim();
    if !email.is_empty() && !EMAIL_REGEX.is_match(email) {
        errors.add(field, "Enter a valid email address.");
    }
}

/// Parse an optional `YYYY-MM-DD` date. Empty input clears the date.
pub fn parse_birth_date(value: &str) -> Result<Option<String>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| Some(d.format("%Y-%m-%d").to_string()))
        .map_err(|_| "Enter a valid date.".to_string())
}

/// Image title taken from an uploaded file name, cut to the column limit.
#[must_use]
pub fn image_title_from_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    let title: String = base.chars().take(limits::IMAGE_TITLE).collect();
    if title.is_empty() {
        "image".to_string()
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_blog() {
        assert!(validate_blog("Travel", "Notes from the road").is_empty());

        let errors = validate_blog("", &"d".repeat(limits::BLOG_DESCRIPTION + 1));
        assert_eq!(errors.field("title"), ["This field is required."]);
        assert_eq!(errors.field("description").len(), 1);
    }

    #[test]
    fn test_validate_post_limits() {
        let errors = validate_post(&"t".repeat(129), &"g".repeat(71), "");
        assert!(errors.field("title")[0].contains("at most 128"));
        assert!(errors.field("tag")[0].contains("at most 70"));
        assert_eq!(errors.field("content"), ["This field is required."]);
        assert!(validate_post("Hello", "rust", "Body").is_empty());
    }

    #[test]
    fn test_email() {
        let mut errors = FormErrors::new();
        check_email(&mut errors, "email", "");
        check_email(&mut errors, "email", "reader@example.com");
        assert!(errors.is_empty());
        check_email(&mut errors, "email", "not-an-address");
        assert_eq!(errors.field("email").len(), 1);
    }

    #[test]
    fn test_parse_birth_date() {
        assert_eq!(parse_birth_date(""), Ok(None));
        assert_eq!(
            parse_birth_date("1990-02-03"),
            Ok(Some("1990-02-03".to_string()))
        );
        assert!(parse_birth_date("03/02/1990").is_err());
    }

    #[test]
    fn test_image_title_from_file_name() {
        assert_eq!(image_title_from_file_name("cat.png"), "cat.png");
        assert_eq!(
            image_title_from_file_name("C:\\photos\\a-very-long-holiday-picture.jpg"),
            "a-very-long-holiday-"
        );
        assert_eq!(image_title_from_file_name(""), "image");
    }

    #[test]
    fn test_into_map() {
        let mut errors = FormErrors::new();
        errors.add(NON_FIELD_ERRORS, "Nope");
        assert_eq!(errors.general(), ["Nope"]);
        let map = errors.into_map();
        assert_eq!(map[NON_FIELD_ERRORS], vec!["Nope".to_string()]);
    }
}
