//! CSV import into the database and shared media cleanup.

use just_blog::config::Config;
use just_blog::db::{
    create_blog, create_image, create_user_with_profile, delete_image, get_posts_for_blog,
    media_file_in_use, Database,
};
use just_blog::import::{import_posts, ImportError};
use just_blog::media::{MediaKind, MediaStorage};
use just_blog::web::{release_media, AppState};
use tempfile::TempDir;

const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0B, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x60,
    0x00, 0x02, 0x00, 0x00, 0x05, 0x00, 0x01, 0x7A, 0x5E, 0xAB, 0x3F, 0x00, 0x00, 0x00, 0x00,
    0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

async fn setup_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = Database::new(&temp_dir.path().join("test.db"))
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

async fn blog(db: &Database) -> (i64, i64) {
    let (_, profile_id) = create_user_with_profile(db.pool(), "alice", "hash")
        .await
        .unwrap();
    let blog_id = create_blog(db.pool(), profile_id, "Imports", "CSV posts")
        .await
        .unwrap();
    (profile_id, blog_id)
}

#[tokio::test]
async fn test_import_creates_unpublished_posts() {
    let (db, _temp) = setup_test_db().await;
    let (profile_id, blog_id) = blog(&db).await;

    let data = "\u{feff}Caf\u{e9},food drink,\"Coffee, then cake\"\nSecond,misc,Body\n";
    let created = import_posts(db.pool(), blog_id, profile_id, data.as_bytes())
        .await
        .unwrap();
    assert_eq!(created, 2);

    let posts = get_posts_for_blog(db.pool(), blog_id, true).await.unwrap();
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(|p| !p.is_published && p.profile_id == profile_id));
    assert!(posts.iter().any(|p| p.title == "Caf\u{e9}" && p.content == "Coffee, then cake"));
    assert!(get_posts_for_blog(db.pool(), blog_id, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bad_record_rejects_whole_file() {
    let (db, _temp) = setup_test_db().await;
    let (profile_id, blog_id) = blog(&db).await;

    let too_long = format!("ok,tag,body\n{},tag,body\n", "t".repeat(201));
    let result = import_posts(db.pool(), blog_id, profile_id, too_long.as_bytes()).await;
    assert!(matches!(
        result,
        Err(ImportError::TooLong { line: 2, field: "title", .. })
    ));

    let blank = b"ok,tag,body\n ,tag,body\n";
    let result = import_posts(db.pool(), blog_id, profile_id, blank).await;
    assert!(matches!(result, Err(ImportError::Blank { field: "title", .. })));

    let result = import_posts(db.pool(), blog_id, profile_id, b"").await;
    assert!(matches!(result, Err(ImportError::Empty)));

    let result = import_posts(db.pool(), blog_id, profile_id, &[0xff, 0xfe, 0x00]).await;
    assert!(matches!(result, Err(ImportError::NotUtf8)));

    assert!(get_posts_for_blog(db.pool(), blog_id, true).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_shared_media_survives_until_last_reference() {
    let (db, temp) = setup_test_db().await;
    let (profile_id, blog_id) = blog(&db).await;
    let post_id = just_blog::db::create_post(
        db.pool(),
        &just_blog::db::NewPost {
            blog_id,
            profile_id,
            title: "Photos".to_string(),
            tag: "x".to_string(),
            content: "y".to_string(),
        },
    )
    .await
    .unwrap();

    let config = Config {
        media_dir: temp.path().join("media"),
        ..Config::default()
    };
    let state = AppState::new(db.clone(), config);
    let file = state
        .media
        .save_image(MediaKind::PostImage, TINY_PNG)
        .await
        .unwrap()
        .path()
        .to_string();

    // The same upload twice shares one stored file
    let first = create_image(db.pool(), post_id, "one", &file).await.unwrap();
    let second = create_image(db.pool(), post_id, "two", &file).await.unwrap();
    let stored = state.media.resolve(&file).unwrap();

    delete_image(db.pool(), first).await.unwrap();
    release_media(&state, &[file.clone()]).await;
    assert!(media_file_in_use(db.pool(), &file).await.unwrap());
    assert!(stored.exists());

    delete_image(db.pool(), second).await.unwrap();
    release_media(&state, &[file.clone()]).await;
    assert!(!stored.exists());
}

#[tokio::test]
async fn test_avatars_and_images_use_separate_directories() {
    let temp = TempDir::new().unwrap();
    let storage = MediaStorage::new(temp.path());

    let image = storage.save_image(MediaKind::PostImage, TINY_PNG).await.unwrap();
    let avatar = storage.save_image(MediaKind::Avatar, TINY_PNG).await.unwrap();
    assert!(image.starts_with("images/"));
    assert!(avatar.starts_with("avatars/"));
    assert!(temp.path().join(image.path()).exists());
    assert!(temp.path().join(avatar.path()).exists());

    assert!(storage
        .save_image(MediaKind::Avatar, b"GIF89a\x01\x00\x01\x00\x00\x00\x00;")
        .await
        .is_err());
}

#[tokio::test]
async fn test_upload_in_flight_is_not_released() {
    let (db, temp) = setup_test_db().await;
    let (profile_id, blog_id) = blog(&db).await;
    let post_id = just_blog::db::create_post(
        db.pool(),
        &just_blog::db::NewPost {
            blog_id,
            profile_id,
            title: "Photos".to_string(),
            tag: "x".to_string(),
            content: "y".to_string(),
        },
    )
    .await
    .unwrap();
    let config = Config {
        media_dir: temp.path().join("media"),
        ..Config::default()
    };
    let state = AppState::new(db.clone(), config);

    // An old image is deleted while a new upload of the same bytes is saved
    let old = state.media.save_image(MediaKind::PostImage, TINY_PNG).await.unwrap();
    let old_id = create_image(db.pool(), post_id, "old", &old).await.unwrap();
    let file = old.path().to_string();
    drop(old);

    let upload = state.media.save_image(MediaKind::PostImage, TINY_PNG).await.unwrap();
    delete_image(db.pool(), old_id).await.unwrap();
    release_media(&state, &[file.clone()]).await;
    assert!(state.media.resolve(&file).unwrap().exists());

    create_image(db.pool(), post_id, "new", &upload).await.unwrap();
    drop(upload);
    release_media(&state, &[file.clone()]).await;
    assert!(state.media.resolve(&file).unwrap().exists());
}
