use crate::db::Database;
use crate::types::{NewSubscription, OwnerId, RefreshUnit, Subscription};
use tempfile::NamedTempFile;


/// Helper: create a fresh database with migrations applied
async fn setup_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

fn new_subscription(folder: &str) -> NewSubscription {
    NewSubscription {
        feed_url: "https://example.com/rss".to_string(),
        parent_folder_id: 0,
        parent_folder_name: "Anime".to_string(),
        cloud_folder_name: folder.to_string(),
        refresh_interval: 30,
        refresh_unit: RefreshUnit::Minutes,
        is_active: true,
    }
}

/// Helper: insert a subscription for `owner` with a provisioned folder
async fn insert_subscription(db: &Database, owner: i64, folder: &str) -> Subscription {
    db.insert_subscription(OwnerId(owner), &new_subscription(folder), 1000)
        .await
        .unwrap()
}
