use regex::Regex;

use crate::db::limits;

static USERNAME_RE: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());

/// Check a username against the account rules.
///
/// Letters, digits and `@ . + - _` are allowed, up to 150 characters.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("This field may not be blank.".to_string());
    }
    if username.chars().count() > limits::USERNAME {
        return Err(format!(
            "Ensure this field has no more than {} characters.",
            limits::USERNAME
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_string(),
        );
    }
    Ok(())
}
