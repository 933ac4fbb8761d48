//! Database tests

use super::*;
use chrono::Utc;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

fn sample_post(content: &str, images: Vec<String>) -> Post {
    Post {
        id: EntityId::new().0,
        title: Some("Title".to_string()),
        content: content.to_string(),
        images,
        created_at: Utc::now(),
        updated_at: None,
    }
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
    // Connection successful if we get here without panicking
}

#[tokio::test]
async fn test_post_create_and_get() {
    let (db, _temp_dir) = create_test_db().await;

    let post = sample_post("<p>Hello, world!</p>", vec![]);
    db.create_post(&post).await.unwrap();

    let retrieved = db.get_post(&post.id).await.unwrap();
    assert!(retrieved.is_some());
    let retrieved = retrieved.unwrap();
    assert_eq!(retrieved.content, "<p>Hello, world!</p>");
    assert_eq!(retrieved.title, Some("Title".to_string()));
    assert!(retrieved.updated_at.is_none());
}

#[tokio::test]
async fn test_image_order_preserved() {
    let (db, _temp_dir) = create_test_db().await;

    let images: Vec<String> = (0..5).map(|i| format!("data:image/png;base64,{i}")).collect();
    let post = sample_post("<p>Pictures</p>", images.clone());
    db.create_post(&post).await.unwrap();

    let retrieved = db.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(retrieved.images, images);

    // Listing path goes through the batch loader; order must match too.
    let all = db.get_all_posts().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].images, images);
}

#[tokio::test]
async fn test_update_replaces_images() {
    let (db, _temp_dir) = create_test_db().await;

    let post = sample_post("<p>Old</p>", vec!["img-a".to_string(), "img-b".to_string()]);
    db.create_post(&post).await.unwrap();

    let new_images = vec!["img-c".to_string()];
    let updated = db
        .update_post(&post.id, None, "<p>New</p>", &new_images)
        .await
        .unwrap();

    assert_eq!(updated.content, "<p>New</p>");
    assert_eq!(updated.title, None);
    assert_eq!(updated.images, new_images);
    assert!(updated.updated_at.is_some());
    assert_eq!(updated.created_at, post.created_at);
}

#[tokio::test]
async fn test_update_missing_post_is_not_found() {
    let (db, _temp_dir) = create_test_db().await;

    let error = db
        .update_post("no-such-id", None, "<p>X</p>", &[])
        .await
        .expect_err("updating a missing post must fail");
    assert!(matches!(error, crate::error::AppError::NotFound));
}

#[tokio::test]
async fn test_delete_post() {
    let (db, _temp_dir) = create_test_db().await;

    let post = sample_post("<p>Bye</p>", vec!["img".to_string()]);
    db.create_post(&post).await.unwrap();

    assert!(db.delete_post(&post.id).await.unwrap());
    assert!(db.get_post(&post.id).await.unwrap().is_none());

    // Deleting again reports "did not exist", not an error.
    assert!(!db.delete_post(&post.id).await.unwrap());
}

#[tokio::test]
async fn test_search_posts_case_insensitive() {
    let (db, _temp_dir) = create_test_db().await;

    let mut titled = sample_post("<p>body</p>", vec![]);
    titled.title = Some("Hello World".to_string());
    db.create_post(&titled).await.unwrap();

    let mut in_content = sample_post("<p>well hello there</p>", vec![]);
    in_content.title = None;
    db.create_post(&in_content).await.unwrap();

    let unrelated = sample_post("<p>something else</p>", vec![]);
    db.create_post(&unrelated).await.unwrap();

    let found = db.search_posts("hello").await.unwrap();
    assert_eq!(found.len(), 2);

    // Empty query is "no filter".
    let all = db.search_posts("   ").await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_stats_counts() {
    let (db, _temp_dir) = create_test_db().await;

    for _ in 0..3 {
        db.create_post(&sample_post("<p>today</p>", vec![])).await.unwrap();
    }

    let mut yesterday = sample_post("<p>yesterday</p>", vec!["img".to_string()]);
    yesterday.created_at = Utc::now() - chrono::Duration::days(1);
    db.create_post(&yesterday).await.unwrap();

    let stats = db.get_stats().await.unwrap();
    assert_eq!(stats.total_posts, 4);
    assert_eq!(stats.today_posts, 3);
    assert_eq!(stats.posts_with_images, 1);
    assert!(stats.last_post_date.is_some());
}

#[tokio::test]
async fn test_stats_on_empty_store() {
    let (db, _temp_dir) = create_test_db().await;

    let stats = db.get_stats().await.unwrap();
    assert_eq!(stats, Stats::empty());
}

#[tokio::test]
async fn test_settings_round_trip() {
    let (db, _temp_dir) = create_test_db().await;

    assert!(db.get_setting("theme").await.unwrap().is_none());

    db.set_setting("theme", &serde_json::json!("dark")).await.unwrap();
    assert_eq!(
        db.get_setting("theme").await.unwrap(),
        Some(serde_json::json!("dark"))
    );

    // Overwrite, no history.
    db.set_setting("theme", &serde_json::json!("light")).await.unwrap();
    assert_eq!(
        db.get_setting("theme").await.unwrap(),
        Some(serde_json::json!("light"))
    );

    // Arbitrary JSON values survive exactly.
    let value = serde_json::json!({"volume": 0.5, "tracks": ["a", "b"]});
    db.set_setting("music", &value).await.unwrap();
    assert_eq!(db.get_setting("music").await.unwrap(), Some(value));

    let all = db.get_all_settings().await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_clear_all_data() {
    let (db, _temp_dir) = create_test_db().await;

    db.create_post(&sample_post("<p>one</p>", vec!["img".to_string()]))
        .await
        .unwrap();
    db.set_setting("theme", &serde_json::json!("dark")).await.unwrap();

    db.clear_all_data().await.unwrap();

    assert!(db.get_all_posts().await.unwrap().is_empty());
    assert!(db.get_all_settings().await.unwrap().is_empty());
    assert_eq!(db.get_stats().await.unwrap().total_posts, 0);
}
