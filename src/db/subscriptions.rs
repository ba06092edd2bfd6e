//! Subscription CRUD and refresh bookkeeping.

use crate::error::DatabaseError;
use crate::types::{NewSubscription, OwnerId, Subscription, SubscriptionId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};

use super::{Database, SubscriptionRow, decode_all};

const SUBSCRIPTION_COLUMNS: &str = r#"
    id, owner_id, feed_url, parent_folder_id, parent_folder_name, cloud_folder_id,
    cloud_folder_name, refresh_interval, refresh_unit, is_active, last_refresh,
    created_at, updated_at
"#;

impl Database {
    /// Insert a subscription whose cloud folder has already been provisioned
    pub async fn insert_subscription(
        &self,
        owner: OwnerId,
        new: &NewSubscription,
        cloud_folder_id: i64,
    ) -> Result<Subscription> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (owner_id, feed_url, parent_folder_id, parent_folder_name,
                                       cloud_folder_id, cloud_folder_name, refresh_interval,
                                       refresh_unit, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(owner)
        .bind(&new.feed_url)
        .bind(new.parent_folder_id)
        .bind(&new.parent_folder_name)
        .bind(cloud_folder_id)
        .bind(&new.cloud_folder_name)
        .bind(i64::from(new.refresh_interval))
        .bind(new.refresh_unit.as_str())
        .bind(new.is_active as i32)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert subscription: {}",
                e
            )))
        })?;

        let id = SubscriptionId(result.last_insert_rowid());
        self.get_subscription(id).await?.ok_or_else(|| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Subscription {} vanished after insert",
                id
            )))
        })
    }

    /// Get a subscription by ID regardless of owner
    pub async fn get_subscription(&self, id: SubscriptionId) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE id = ?",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get subscription: {}",
                e
            )))
        })?;

        Ok(row.map(Subscription::try_from).transpose()?)
    }

    /// Get a subscription by ID if it belongs to `owner`
    pub async fn get_owned_subscription(
        &self,
        owner: OwnerId,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE id = ? AND owner_id = ?",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get subscription: {}",
                e
            )))
        })?;

        Ok(row.map(Subscription::try_from).transpose()?)
    }

    /// List an owner's subscriptions, optionally filtered by folder name
    ///
    /// `search` matches (case-insensitively, as a substring) either the parent
    /// folder name or the subscription folder name.
    pub async fn list_subscriptions(
        &self,
        owner: OwnerId,
        search: Option<&str>,
    ) -> Result<Vec<Subscription>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")));

        let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE owner_id = ?
              AND (? IS NULL
                   OR parent_folder_name LIKE ? ESCAPE '\'
                   OR cloud_folder_name LIKE ? ESCAPE '\')
            ORDER BY created_at DESC, id DESC
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(owner)
        .bind(pattern.as_deref())
        .bind(pattern.as_deref())
        .bind(pattern.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list subscriptions: {}",
                e
            )))
        })?;

        Ok(decode_all(rows)?)
    }

    /// All active subscriptions across owners, in ID order
    pub async fn list_active_subscriptions(&self) -> Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE is_active = 1 ORDER BY id ASC",
            SUBSCRIPTION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list active subscriptions: {}",
                e
            )))
        })?;

        Ok(decode_all(rows)?)
    }

    /// Write the user-editable fields of a subscription back
    ///
    /// Returns `false` when no subscription with that ID belongs to its owner.
    pub async fn update_subscription(&self, subscription: &Subscription) -> Result<bool> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET feed_url = ?, parent_folder_name = ?, cloud_folder_name = ?,
                refresh_interval = ?, refresh_unit = ?, is_active = ?, updated_at = ?
            WHERE id = ? AND owner_id = ?
            "#,
        )
        .bind(&subscription.feed_url)
        .bind(&subscription.parent_folder_name)
        .bind(&subscription.cloud_folder_name)
        .bind(i64::from(subscription.refresh_interval))
        .bind(subscription.refresh_unit.as_str())
        .bind(subscription.is_active as i32)
        .bind(now)
        .bind(subscription.id)
        .bind(subscription.owner_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update subscription: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Flip the active flag
    pub async fn toggle_subscription(&self, owner: OwnerId, id: SubscriptionId) -> Result<bool> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET is_active = 1 - is_active, updated_at = ?
            WHERE id = ? AND owner_id = ?
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to toggle subscription: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a subscription (cascades to its links)
    pub async fn delete_subscription(&self, owner: OwnerId, id: SubscriptionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete subscription: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a completed parse-and-persist cycle
    pub async fn touch_last_refresh(&self, id: SubscriptionId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE subscriptions SET last_refresh = ?, updated_at = ? WHERE id = ?")
            .bind(at.timestamp())
            .bind(at.timestamp())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update last refresh: {}",
                    e
                )))
            })?;

        Ok(())
    }
}
