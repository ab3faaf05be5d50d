use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Name of the hidden form field carrying the CSRF token.
pub const CSRF_FIELD: &str = "csrf_token";

/// Header carrying the CSRF token for session-authenticated API calls.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Generate a CSRF token for form protection.
pub fn generate_csrf_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Compare a submitted token with the session's, in constant time.
#[must_use]
pub fn verify_csrf_token(expected: &str, submitted: Option<&str>) -> bool {
    let Some(submitted) = submitted else {
        return false;
    };
    if expected.is_empty() || expected.len() != submitted.len() {
        return false;
    }
    expected
        .bytes()
        .zip(submitted.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
