use rand::{thread_rng, Rng};

/// Generate an API token key: 40 lowercase hex characters.
pub fn generate_api_token() -> String {
    let bytes: [u8; 20] = thread_rng().gen();
    hex::encode(bytes)
}

/// Extract the key from an `Authorization: Token <key>` header value.
#[must_use]
pub fn parse_token_header(value: &str) -> Option<&str> {
    let (scheme, key) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("token") {
        return None;
    }
    let key = key.trim();
    (!key.is_empty() && !key.contains(' ')).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_api_token() {
        let key = generate_api_token();
        assert_eq!(key.len(), 40);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_api_token());
    }

    #[test]
    fn test_parse_token_header() {
        assert_eq!(parse_token_header("Token abc123"), Some("abc123"));
        assert_eq!(parse_token_header("token  abc123 "), Some("abc123"));
        assert_eq!(parse_token_header("Bearer abc123"), None);
        assert_eq!(parse_token_header("Token"), None);
        assert_eq!(parse_token_header("Token a b"), None);
    }
}
