//! Integration tests for authentication.

use just_blog::auth::{
    authenticate, ensure_admin, hash_password, password_problems, resolve_session,
    start_session, validate_new_password, verify_password, LoginError, SessionDuration,
};
use just_blog::db::{
    count_user_sessions, create_session, create_user, create_user_with_profile,
    delete_expired_sessions, get_profile_by_user, get_session_by_token, get_user_by_id,
    get_user_by_username, lock_user_until, Database,
};
use tempfile::TempDir;

async fn setup_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

async fn user_with_password(db: &Database, username: &str, password: &str) -> i64 {
    let hash = hash_password(password).expect("Failed to hash password");
    let (user_id, _) = create_user_with_profile(db.pool(), username, &hash)
        .await
        .expect("Failed to create user");
    user_id
}

#[tokio::test]
async fn test_password_hashing() {
    let password = "SecureP@ssw0rd123";
    let hash = hash_password(password).expect("Failed to hash password");

    assert!(hash.starts_with("$argon2id$"));
    assert!(verify_password(password, &hash).expect("Failed to verify password"));
    assert!(!verify_password("WrongPassword", &hash).expect("Failed to verify password"));
}

#[tokio::test]
async fn test_password_rules() {
    assert!(password_problems("long enough").is_empty());
    assert_eq!(password_problems("short").len(), 1);
    // Too short and entirely numeric
    assert_eq!(password_problems("1234").len(), 2);
    assert_eq!(password_problems("1234567890").len(), 1);

    assert!(validate_new_password("correct horse", "correct horse").is_ok());
    let mismatch = validate_new_password("correct horse", "battery staple").unwrap_err();
    assert_eq!(mismatch, vec!["The two password fields didn't match.".to_string()]);
}

#[tokio::test]
async fn test_authenticate_success_resets_failures() {
    let (db, _temp) = setup_test_db().await;
    let user_id = user_with_password(&db, "alice", "wonderland").await;

    assert!(matches!(
        authenticate(db.pool(), "alice", "wrong-password").await,
        Err(LoginError::InvalidCredentials)
    ));
    let user = get_user_by_id(db.pool(), user_id).await.unwrap().unwrap();
    assert_eq!(user.failed_login_attempts, 1);

    let user = authenticate(db.pool(), " alice ", "wonderland").await.unwrap();
    assert_eq!(user.id, user_id);
    let user = get_user_by_id(db.pool(), user_id).await.unwrap().unwrap();
    assert_eq!(user.failed_login_attempts, 0);
}

#[tokio::test]
async fn test_authenticate_rejections() {
    let (db, _temp) = setup_test_db().await;
    user_with_password(&db, "alice", "wonderland").await;

    assert!(matches!(
        authenticate(db.pool(), "", "x").await,
        Err(LoginError::MissingCredentials)
    ));
    assert!(matches!(
        authenticate(db.pool(), "nobody", "wonderland").await,
        Err(LoginError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_lockout_after_repeated_failures() {
    let (db, _temp) = setup_test_db().await;
    let user_id = user_with_password(&db, "alice", "wonderland").await;

    for _ in 0..5 {
        let _ = authenticate(db.pool(), "alice", "bad").await;
    }
    let user = get_user_by_id(db.pool(), user_id).await.unwrap().unwrap();
    assert!(user.locked_until.is_some());

    // Even the right password is refused while locked
    assert!(matches!(
        authenticate(db.pool(), "alice", "wonderland").await,
        Err(LoginError::Locked)
    ));
}

#[tokio::test]
async fn test_expired_lock_allows_login() {
    let (db, _temp) = setup_test_db().await;
    let user_id = user_with_password(&db, "alice", "wonderland").await;
    lock_user_until(db.pool(), user_id, "2000-01-01T00:00:00Z")
        .await
        .unwrap();

    assert!(authenticate(db.pool(), "alice", "wonderland").await.is_ok());
}

#[tokio::test]
async fn test_sessions_resolve_and_expire() {
    let (db, _temp) = setup_test_db().await;
    let user_id = user_with_password(&db, "alice", "wonderland").await;

    let session = start_session(db.pool(), user_id, SessionDuration::Short, "127.0.0.1", None)
        .await
        .unwrap();
    assert_eq!(session.token.len(), 64);
    assert_eq!(session.max_age, 3600);

    let current = resolve_session(db.pool(), &session.token).await.unwrap();
    assert_eq!(current.user.id, user_id);
    assert_eq!(current.csrf_token(), session.csrf_token);

    create_session(
        db.pool(),
        user_id,
        "expired-token",
        "csrf",
        "127.0.0.1",
        None,
        "2000-01-01T00:00:00Z",
    )
    .await
    .unwrap();
    assert!(resolve_session(db.pool(), "expired-token").await.is_none());
    // Expired sessions are removed when seen
    assert!(get_session_by_token(db.pool(), "expired-token")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_remember_me_session_length() {
    assert_eq!(SessionDuration::from_remember(true).as_seconds(), 2_592_000);
    assert_eq!(SessionDuration::from_remember(false).as_seconds(), 3600);
}

#[tokio::test]
async fn test_session_limit_evicts_oldest() {
    let (db, _temp) = setup_test_db().await;
    let user_id = user_with_password(&db, "alice", "wonderland").await;

    let first = start_session(db.pool(), user_id, SessionDuration::Long, "ip", None)
        .await
        .unwrap();
    for _ in 0..10 {
        start_session(db.pool(), user_id, SessionDuration::Long, "ip", None)
            .await
            .unwrap();
    }

    assert_eq!(count_user_sessions(db.pool(), user_id).await.unwrap(), 10);
    assert!(get_session_by_token(db.pool(), &first.token)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_cleanup_deletes_expired_sessions() {
    let (db, _temp) = setup_test_db().await;
    let user_id = user_with_password(&db, "alice", "wonderland").await;

    create_session(db.pool(), user_id, "old", "c", "ip", None, "2000-01-01T00:00:00Z")
        .await
        .unwrap();
    start_session(db.pool(), user_id, SessionDuration::Short, "ip", None)
        .await
        .unwrap();

    assert_eq!(delete_expired_sessions(db.pool()).await.unwrap(), 1);
    assert_eq!(count_user_sessions(db.pool(), user_id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_ensure_admin_creates_once() {
    let (db, _temp) = setup_test_db().await;

    assert!(ensure_admin(db.pool(), "admin", "administrator").await.unwrap());
    let admin = get_user_by_username(db.pool(), "admin").await.unwrap().unwrap();
    assert!(admin.is_admin);
    assert!(get_profile_by_user(db.pool(), admin.id).await.unwrap().is_some());

    // A second start leaves the account alone
    assert!(!ensure_admin(db.pool(), "admin", "another password").await.unwrap());
    assert!(authenticate(db.pool(), "admin", "administrator").await.is_ok());

    assert!(ensure_admin(db.pool(), "bad name!", "administrator").await.is_err());
}

#[tokio::test]
async fn test_inactive_accounts_cannot_log_in() {
    let (db, _temp) = setup_test_db().await;
    let hash = hash_password("wonderland").unwrap();
    let user_id = create_user(db.pool(), "ghost", &hash, "", false).await.unwrap();
    sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
        .bind(user_id)
        .execute(db.pool())
        .await
        .unwrap();

    assert!(matches!(
        authenticate(db.pool(), "ghost", "wonderland").await,
        Err(LoginError::Inactive)
    ));
}
