//! Integration tests for the HTML routes, run against the real router.

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use just_blog::auth::{hash_password, start_session, SessionDuration};
use just_blog::config::Config;
use just_blog::db::{
    create_blog, create_post, create_user_with_profile, get_blogs_for_profile,
    get_images_for_post, get_post, get_posts_for_blog, publish_post, Database, NewPost,
};
use just_blog::web::{create_app, AppState};
use serial_test::serial;
use tempfile::TempDir;
use tower::ServiceExt;

const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0B, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x60,
    0x00, 0x02, 0x00, 0x00, 0x05, 0x00, 0x01, 0x7A, 0x5E, 0xAB, 0x3F, 0x00, 0x00, 0x00, 0x00,
    0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

const BOUNDARY: &str = "just-blog-test-boundary";

struct TestApp {
    app: Router,
    db: Database,
    temp_dir: TempDir,
}

/// A signed-in visitor: cookie header value and the session's CSRF token.
struct Visitor {
    profile_id: i64,
    cookie: String,
    csrf: String,
}

async fn setup() -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = Database::new(&temp_dir.path().join("test.db"))
        .await
        .expect("Failed to create database");
    let config = Config {
        media_dir: temp_dir.path().join("media"),
        static_dir: temp_dir.path().join("static"),
        base_url: "http://testserver".to_string(),
        page_size: 2,
        ..Config::default()
    };
    let app = create_app(AppState::new(db.clone(), config));
    TestApp { app, db, temp_dir }
}

async fn sign_in(db: &Database, username: &str) -> Visitor {
    let hash = hash_password("correct horse").unwrap();
    let (user_id, profile_id) = create_user_with_profile(db.pool(), username, &hash)
        .await
        .unwrap();
    let session = start_session(db.pool(), user_id, SessionDuration::Short, "127.0.0.1", None)
        .await
        .unwrap();
    Visitor {
        profile_id,
        cookie: format!("session={}", session.token),
        csrf: session.csrf_token,
    }
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

fn get(uri: &str, visitor: Option<&Visitor>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(v) = visitor {
        builder = builder.header(header::COOKIE, &v.cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, visitor: Option<&Visitor>, fields: &[(&str, &str)]) -> Request<Body> {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(v) = visitor {
        builder = builder.header(header::COOKIE, &v.cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

/// Build a multipart body from text fields and `(field, file name, bytes)` files.
fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn post_multipart(uri: &str, visitor: &Visitor, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, &visitor.cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn blog_with_post(db: &Database, profile_id: i64, title: &str) -> (i64, i64) {
    let blog_id = create_blog(db.pool(), profile_id, "Notes", "Daily notes")
        .await
        .unwrap();
    let post_id = create_post(
        db.pool(),
        &NewPost {
            blog_id,
            profile_id,
            title: title.to_string(),
            tag: "rust web".to_string(),
            content: "Body text".to_string(),
        },
    )
    .await
    .unwrap();
    (blog_id, post_id)
}

#[tokio::test]
async fn test_root_redirects_to_main() {
    let t = setup().await;
    let response = send(&t.app, get("/", None)).await;
    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(location(&response), "/main/");

    let response = send(&t.app, get("/blogs/", None)).await;
    assert_eq!(location(&response), "/blogs/posts-latest/");
}

#[tokio::test]
async fn test_health_check() {
    let t = setup().await;
    let response = send(&t.app, get("/healthz", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}

#[tokio::test]
async fn test_static_pages() {
    let t = setup().await;
    for uri in ["/main/", "/main/about/", "/main/contacts/", "/blogs/posts-latest/"] {
        let response = send(&t.app, get(uri, None)).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }

    let response = send(&t.app, get("/main/", None)).await;
    assert!(body_text(response).await.contains("Nothing has been published yet."));
}

#[tokio::test]
async fn test_index_lists_only_published_posts() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;
    let (blog_id, published) = blog_with_post(&t.db, alice.profile_id, "Shown post").await;
    publish_post(t.db.pool(), published).await.unwrap();
    create_post(
        t.db.pool(),
        &NewPost {
            blog_id,
            profile_id: alice.profile_id,
            title: "Hidden draft".to_string(),
            tag: "x".to_string(),
            content: "y".to_string(),
        },
    )
    .await
    .unwrap();

    let html = body_text(send(&t.app, get("/main/", None)).await).await;
    assert!(html.contains("Shown post"));
    assert!(!html.contains("Hidden draft"));
}

#[tokio::test]
async fn test_registration_signs_in_and_opens_profile_update() {
    let t = setup().await;
    let response = send(
        &t.app,
        post_form(
            "/users/get-started/",
            None,
            &[
                ("username", "newbie"),
                ("password1", "long password"),
                ("password2", "long password"),
            ],
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/users/profile-update/"));
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_registration_errors_rerender_form() {
    let t = setup().await;
    sign_in(&t.db, "taken").await;

    let response = send(
        &t.app,
        post_form(
            "/users/get-started/",
            None,
            &[
                ("username", "taken"),
                ("password1", "long password"),
                ("password2", "other password"),
            ],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("A user with that username already exists."));
    assert!(html.contains("The two password fields"));
}

#[tokio::test]
async fn test_login_flow() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;

    let response = send(
        &t.app,
        post_form(
            "/users/login/",
            None,
            &[("username", "alice"), ("password", "wrong password")],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Invalid username or password"));

    let response = send(
        &t.app,
        post_form(
            "/users/login/",
            None,
            &[("username", "alice"), ("password", "correct horse")],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("/users/profile-details/{}/", alice.profile_id)
    );

    let response = send(
        &t.app,
        post_form(
            "/users/login/",
            None,
            &[
                ("username", "alice"),
                ("password", "correct horse"),
                ("next", "/blogs/new-blog/"),
                ("remember", "true"),
            ],
        ),
    )
    .await;
    assert_eq!(location(&response), "/blogs/new-blog/");
    let cookie = response.headers().get(header::SET_COOKIE).unwrap();
    assert!(cookie.to_str().unwrap().contains("Max-Age=2592000"));
}

#[tokio::test]
async fn test_login_ignores_offsite_next() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;

    let response = send(
        &t.app,
        post_form(
            "/users/login/",
            None,
            &[
                ("username", "alice"),
                ("password", "correct horse"),
                ("next", "https://evil.example/"),
            ],
        ),
    )
    .await;
    assert_eq!(
        location(&response),
        format!("/users/profile-details/{}/", alice.profile_id)
    );
}

#[tokio::test]
async fn test_login_rejects_next_with_control_characters() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;

    for next in ["/%09/evil.example", "/%0Aabc", "/%0D%0ASet-Cookie:%20x=1"] {
        let uri = format!("/users/login/?next={next}");
        let response = send(&t.app, get(&uri, Some(&alice))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "next={next}");
        assert_eq!(location(&response), "/main/");
    }

    let response = send(
        &t.app,
        post_form(
            "/users/login/",
            None,
            &[
                ("username", "alice"),
                ("password", "correct horse"),
                ("next", "/\t/evil.example"),
            ],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("/users/profile-details/{}/", alice.profile_id)
    );

    let response = send(
        &t.app,
        post_form(
            "/users/login/",
            None,
            &[
                ("username", "alice"),
                ("password", "correct horse"),
                ("next", "/blogs/\n"),
            ],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("/users/profile-details/{}/", alice.profile_id)
    );
}

#[tokio::test]
async fn test_logout_requires_csrf_and_clears_cookie() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;

    let response = send(&t.app, post_form("/users/logout/", Some(&alice), &[])).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &t.app,
        post_form("/users/logout/", Some(&alice), &[("csrf_token", alice.csrf.as_str())]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/main/");
    let cookie = response.headers().get(header::SET_COOKIE).unwrap();
    assert!(cookie.to_str().unwrap().contains("Max-Age=0"));

    // The session is gone
    let response = send(&t.app, get("/blogs/new-blog/", Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_anonymous_visitors_are_sent_to_login() {
    let t = setup().await;
    let response = send(&t.app, get("/blogs/new-blog/", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "/users/login/?next=%2Fblogs%2Fnew-blog%2F"
    );
}

#[tokio::test]
async fn test_profile_pages_are_owner_only() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;
    let bob = sign_in(&t.db, "bob").await;

    let own = format!("/users/profile-details/{}/", alice.profile_id);
    assert_eq!(send(&t.app, get(&own, Some(&alice))).await.status(), StatusCode::OK);
    assert_eq!(send(&t.app, get(&own, Some(&bob))).await.status(), StatusCode::FORBIDDEN);

    let update = format!("/users/profile-update/{}/", alice.profile_id);
    assert_eq!(send(&t.app, get(&update, Some(&bob))).await.status(), StatusCode::FORBIDDEN);

    let public = format!("/users/profile-public/{}/", alice.profile_id);
    let response = send(&t.app, get(&public, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("alice"));

    let missing = send(&t.app, get("/users/profile-public/999/", None)).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_update_with_avatar() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;

    let body = multipart_body(
        &[
            ("csrf_token", alice.csrf.as_str()),
            ("first_name", "Alice"),
            ("last_name", "Liddell"),
            ("email", "alice@example.com"),
            ("bio", "Down the rabbit hole"),
            ("birth_date", "1990-05-04"),
        ],
        &[("avatar", "me.png", TINY_PNG)],
    );
    let uri = format!("/users/profile-update/{}/", alice.profile_id);
    let response = send(&t.app, post_multipart(&uri, &alice, body)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let html = body_text(
        send(
            &t.app,
            get(&format!("/users/profile-details/{}/", alice.profile_id), Some(&alice)),
        )
        .await,
    )
    .await;
    assert!(html.contains("Down the rabbit hole"));
    assert!(html.contains("/media/avatars/"));

    let stored = std::fs::read_dir(t.temp_dir.path().join("media/avatars"))
        .unwrap()
        .count();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn test_profile_update_rejects_bad_input() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;

    let body = multipart_body(
        &[
            ("csrf_token", alice.csrf.as_str()),
            ("email", "not-an-email"),
            ("birth_date", "05/04/1990"),
        ],
        &[("avatar", "fake.png", b"not an image")],
    );
    let uri = format!("/users/profile-update/{}/", alice.profile_id);
    let response = send(&t.app, post_multipart(&uri, &alice, body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Enter a valid email address."));
    assert!(html.contains("Enter a valid date."));
}

#[tokio::test]
async fn test_create_blog_requires_csrf() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;

    let response = send(
        &t.app,
        post_form(
            "/blogs/new-blog/",
            Some(&alice),
            &[("title", "Travel"), ("description", "Trips")],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &t.app,
        post_form(
            "/blogs/new-blog/",
            Some(&alice),
            &[
                ("csrf_token", alice.csrf.as_str()),
                ("title", "Travel"),
                ("description", "Trips"),
            ],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let blogs = get_blogs_for_profile(t.db.pool(), alice.profile_id).await.unwrap();
    assert_eq!(blogs.len(), 1);
    assert_eq!(location(&response), format!("/blogs/blog-detail/{}/", blogs[0].id));
}

#[tokio::test]
async fn test_blog_validation_errors() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;
    let long_title = "x".repeat(129);

    let response = send(
        &t.app,
        post_form(
            "/blogs/new-blog/",
            Some(&alice),
            &[
                ("csrf_token", alice.csrf.as_str()),
                ("title", long_title.as_str()),
                ("description", ""),
            ],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Ensure this field has at most 128 characters (it has 129)."));
    assert!(html.contains("This field is required."));
}

#[tokio::test]
async fn test_blog_edit_and_delete_are_owner_only() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;
    let bob = sign_in(&t.db, "bob").await;
    let (blog_id, post_id) = blog_with_post(&t.db, alice.profile_id, "Entry").await;

    let edit = format!("/blogs/blog-edit/{blog_id}/");
    assert_eq!(send(&t.app, get(&edit, Some(&bob))).await.status(), StatusCode::FORBIDDEN);

    let delete = format!("/blogs/blog-delete/{blog_id}/");
    let confirm = send(&t.app, get(&delete, Some(&alice))).await;
    assert_eq!(confirm.status(), StatusCode::OK);

    let response = send(
        &t.app,
        post_form(&delete, Some(&bob), &[("csrf_token", bob.csrf.as_str())]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &t.app,
        post_form(&delete, Some(&alice), &[("csrf_token", alice.csrf.as_str())]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/blogs/blog/{}/", alice.profile_id));
    assert!(get_post(t.db.pool(), post_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unpublished_post_visibility() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;
    let bob = sign_in(&t.db, "bob").await;
    let (_, post_id) = blog_with_post(&t.db, alice.profile_id, "Secret draft").await;
    let uri = format!("/blogs/post-detail/{post_id}/");

    let response = send(&t.app, get(&uri, None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/users/login/?next="));

    assert_eq!(send(&t.app, get(&uri, Some(&bob))).await.status(), StatusCode::FORBIDDEN);

    let response = send(&t.app, get(&uri, Some(&alice))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Secret draft"));
    assert!(html.contains("Not published"));
    assert!(html.contains("#rust"));
}

#[tokio::test]
async fn test_publish_archive_toggle() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;
    let bob = sign_in(&t.db, "bob").await;
    let (_, post_id) = blog_with_post(&t.db, alice.profile_id, "Toggle me").await;
    let uri = format!("/blogs/publish-archive/{post_id}/");

    let response = send(&t.app, post_form(&uri, Some(&bob), &[("csrf_token", bob.csrf.as_str())])).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &t.app,
        post_form(&uri, Some(&alice), &[("csrf_token", alice.csrf.as_str())]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let post = get_post(t.db.pool(), post_id).await.unwrap().unwrap();
    assert!(post.is_published);
    assert!(post.published_at.is_some());

    // Now public
    let detail = format!("/blogs/post-detail/{post_id}/");
    assert_eq!(send(&t.app, get(&detail, None)).await.status(), StatusCode::OK);

    send(
        &t.app,
        post_form(&uri, Some(&alice), &[("csrf_token", alice.csrf.as_str())]),
    )
    .await;
    let post = get_post(t.db.pool(), post_id).await.unwrap().unwrap();
    assert!(!post.is_published);
    assert!(post.published_at.is_none());
}

#[tokio::test]
async fn test_new_post_with_images() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;
    let blog_id = create_blog(t.db.pool(), alice.profile_id, "Photos", "Pictures")
        .await
        .unwrap();

    let body = multipart_body(
        &[
            ("csrf_token", alice.csrf.as_str()),
            ("title", "Holiday"),
            ("tag", "travel sea"),
            ("content", "We went to the sea."),
        ],
        &[("images", "a-very-long-file-name-for-a-photo.png", TINY_PNG)],
    );
    let response = send(
        &t.app,
        post_multipart(&format!("/blogs/new-post/{blog_id}/"), &alice, body),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/blogs/post-detail/"));

    let posts = get_posts_for_blog(t.db.pool(), blog_id, true).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert!(!posts[0].is_published);
    let images = get_images_for_post(t.db.pool(), posts[0].id).await.unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].title.chars().count(), 20);
    assert!(t.temp_dir.path().join("media").join(&images[0].file).exists());

    let response = send(&t.app, get(&format!("/media/{}", images[0].file), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");

    let missing = send(&t.app, get("/media/images/missing.png", None)).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_new_post_rejects_invalid_image() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;
    let blog_id = create_blog(t.db.pool(), alice.profile_id, "Photos", "Pictures")
        .await
        .unwrap();

    let body = multipart_body(
        &[
            ("csrf_token", alice.csrf.as_str()),
            ("title", "Broken"),
            ("tag", "x"),
            ("content", "y"),
        ],
        &[("images", "notes.txt", b"plain text")],
    );
    let response = send(
        &t.app,
        post_multipart(&format!("/blogs/new-post/{blog_id}/"), &alice, body),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("notes.txt"));
    assert!(get_posts_for_blog(t.db.pool(), blog_id, true).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_new_post_in_foreign_blog_is_forbidden() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;
    let bob = sign_in(&t.db, "bob").await;
    let blog_id = create_blog(t.db.pool(), alice.profile_id, "Mine", "Only mine")
        .await
        .unwrap();

    let body = multipart_body(
        &[("csrf_token", bob.csrf.as_str()), ("title", "t"), ("tag", "g"), ("content", "c")],
        &[],
    );
    let response = send(
        &t.app,
        post_multipart(&format!("/blogs/new-post/{blog_id}/"), &bob, body),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_csv_import() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;
    let blog_id = create_blog(t.db.pool(), alice.profile_id, "Bulk", "Imported")
        .await
        .unwrap();
    let uri = format!("/blogs/new-post/{blog_id}/");

    let csv = b"First,news,Hello\n\"Second, quoted\",misc,\"multi\nline\"\n";
    let body = multipart_body(&[("csrf_token", alice.csrf.as_str())], &[("file", "posts.csv", csv)]);
    let response = send(&t.app, post_multipart(&uri, &alice, body)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/blogs/blog-detail/{blog_id}/"));
    assert_eq!(get_posts_for_blog(t.db.pool(), blog_id, true).await.unwrap().len(), 2);

    // One bad row rejects the whole file
    let bad = b"Fine,tag,content\nbroken,row\n";
    let body = multipart_body(&[("csrf_token", alice.csrf.as_str())], &[("file", "bad.csv", bad)]);
    let response = send(&t.app, post_multipart(&uri, &alice, body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("The file you tried to upload is invalid."));
    assert_eq!(get_posts_for_blog(t.db.pool(), blog_id, true).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_post_edit_and_delete() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;
    let bob = sign_in(&t.db, "bob").await;
    let (blog_id, post_id) = blog_with_post(&t.db, alice.profile_id, "Original").await;

    let edit = format!("/blogs/post-edit/{post_id}/");
    assert_eq!(send(&t.app, get(&edit, Some(&bob))).await.status(), StatusCode::FORBIDDEN);

    let body = multipart_body(
        &[
            ("csrf_token", alice.csrf.as_str()),
            ("title", "Edited"),
            ("tag", "changed"),
            ("content", "New body"),
        ],
        &[],
    );
    let response = send(&t.app, post_multipart(&edit, &alice, body)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let post = get_post(t.db.pool(), post_id).await.unwrap().unwrap();
    assert_eq!(post.title, "Edited");
    assert_eq!(post.tag, "changed");

    let delete = format!("/blogs/post-delete/{post_id}/");
    let response = send(
        &t.app,
        post_form(&delete, Some(&alice), &[("csrf_token", alice.csrf.as_str())]),
    )
    .await;
    assert_eq!(location(&response), format!("/blogs/blog-detail/{blog_id}/"));
    assert!(get_post(t.db.pool(), post_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_latest_posts_pagination() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;
    let blog_id = create_blog(t.db.pool(), alice.profile_id, "Many", "Posts")
        .await
        .unwrap();
    for i in 0..3 {
        let id = create_post(
            t.db.pool(),
            &NewPost {
                blog_id,
                profile_id: alice.profile_id,
                title: format!("Post number {i}"),
                tag: "t".to_string(),
                content: "c".to_string(),
            },
        )
        .await
        .unwrap();
        publish_post(t.db.pool(), id).await.unwrap();
    }

    let first = body_text(send(&t.app, get("/blogs/posts-latest/", None)).await).await;
    assert!(first.contains("Post number 2"));
    assert!(!first.contains("Post number 0"));
    assert!(first.contains("page=2"));

    // Out-of-range pages clamp to the last one
    let last = body_text(send(&t.app, get("/blogs/posts-latest/?page=9", None)).await).await;
    assert!(last.contains("Post number 0"));

    // Anything that is not a page number shows the first page
    for uri in [
        "/blogs/posts-latest/?page=abc",
        "/blogs/posts-latest/?page=",
        "/blogs/posts-latest/?page=-3",
        "/blogs/posts-latest/?page=99999999999999999999",
    ] {
        let response = send(&t.app, get(uri, None)).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let body = body_text(response).await;
        assert!(body.contains("Post number 2"), "{uri}");
        assert!(!body.contains("Post number 0"), "{uri}");
    }
}

#[tokio::test]
async fn test_feed_and_sitemaps() {
    let t = setup().await;
    let alice = sign_in(&t.db, "alice").await;
    let (_, post_id) = blog_with_post(&t.db, alice.profile_id, "Feed item").await;
    publish_post(t.db.pool(), post_id).await.unwrap();

    let response = send(&t.app, get("/posts-feed/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/rss+xml"));
    let rss = body_text(response).await;
    assert!(rss.contains("<title>Feed item</title>"));
    assert!(rss.contains(&format!(
        "<link>http://testserver/blogs/post-detail/{post_id}/</link>"
    )));

    let sitemap = body_text(send(&t.app, get("/sitemap-posts.xml/", None)).await).await;
    assert!(sitemap.contains(&format!("http://testserver/blogs/post-detail/{post_id}/")));
    assert!(sitemap.contains("<lastmod>"));

    let sitemap = body_text(send(&t.app, get("/sitemap-static.xml/", None)).await).await;
    assert!(sitemap.contains("http://testserver/main/about/"));
}

#[tokio::test]
async fn test_unknown_blog_is_not_found() {
    let t = setup().await;
    let response = send(&t.app, get("/blogs/blog-detail/42/", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Back to the home page"));
}

#[test]
#[serial]
fn test_config_from_env() {
    std::env::set_var("BASE_URL", "https://blog.example/");
    std::env::set_var("PAGE_SIZE", "25");
    let config = Config::from_env().expect("Failed to load config");
    std::env::remove_var("BASE_URL");
    std::env::remove_var("PAGE_SIZE");

    assert_eq!(config.base_url, "https://blog.example");
    assert_eq!(config.page_size, 25);
    assert!(config.validate().is_ok());
}
