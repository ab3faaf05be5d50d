pub mod bootstrap;
pub mod cleanup;
pub mod csrf;
pub mod login;
pub mod middleware;
pub mod password;
pub mod session;
pub mod token;
pub mod username;

pub use bootstrap::ensure_admin;
pub use cleanup::run_cleanup_worker;
pub use csrf::{generate_csrf_token, verify_csrf_token, CSRF_FIELD, CSRF_HEADER};
pub use login::{authenticate, LoginError};
pub use middleware::{
    get_client_ip, get_user_agent, login_redirect, resolve_session, safe_next, ClientInfo,
    CurrentUser, MaybeUser, RequireUser,
};
pub use password::{
    hash_password, password_problems, validate_new_password, verify_password, MIN_PASSWORD_LENGTH,
};
pub use session::{
    clear_session_cookie, generate_session_token, session_cookie, session_token_from_headers,
    start_session, NewSession, SessionDuration,
};
pub use token::{generate_api_token, parse_token_header};
pub use username::validate_username;
