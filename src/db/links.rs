//! Link insertion, listing and download-state transitions.

use crate::error::DatabaseError;
use crate::types::{CandidateEntry, Link, LinkId, OwnerId, SubscriptionId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashSet;
use std::time::Duration;

use super::{Database, LinkRow, decode_all};

const LINK_COLUMNS: &str = r#"
    l.id, l.subscription_id, l.title, l.magnet_uri, l.link, l.author, l.category,
    l.description, l.size, l.published_at, l.created_at, l.download_status,
    l.download_task_id, l.download_file_id, l.download_fail_reason,
    l.download_created_at, l.download_completed_at
"#;

/// Which failed links a bulk retry should pick up
#[derive(Debug, Clone, Copy)]
pub enum FailedSelection<'a> {
    /// Every failed link
    All,
    /// Failed links among these IDs
    Links(&'a [LinkId]),
    /// Failed links belonging to these subscriptions
    Subscriptions(&'a [SubscriptionId]),
}

fn query_failed(context: &str, e: sqlx::Error) -> Error {
    Error::Database(DatabaseError::QueryFailed(format!("Failed to {}: {}", context, e)))
}

impl Database {
    /// Insert newly discovered entries as pending links
    ///
    /// Entries whose magnet URI already exists for the subscription are
    /// ignored. Returns how many rows were actually inserted.
    pub async fn insert_links(
        &self,
        subscription_id: SubscriptionId,
        entries: &[CandidateEntry],
    ) -> Result<usize> {
        let now = Utc::now().timestamp();
        let mut inserted = 0;

        for entry in entries {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO links (subscription_id, title, magnet_uri, link, author,
                                             category, description, size, published_at,
                                             created_at, download_status)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending')
                "#,
            )
            .bind(subscription_id)
            .bind(&entry.title)
            .bind(&entry.magnet_uri)
            .bind(entry.link.as_deref())
            .bind(entry.author.as_deref())
            .bind(entry.category.as_deref())
            .bind(entry.description.as_deref())
            .bind(entry.size.as_deref())
            .bind(entry.published_at.map(|t| t.timestamp()))
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("insert link", e))?;

            inserted += result.rows_affected() as usize;
        }

        Ok(inserted)
    }

    /// Magnet URIs already stored for a subscription
    pub async fn get_magnet_uris(&self, subscription_id: SubscriptionId) -> Result<HashSet<String>> {
        let uris: Vec<String> =
            sqlx::query_scalar("SELECT magnet_uri FROM links WHERE subscription_id = ?")
                .bind(subscription_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| query_failed("get magnet URIs", e))?;

        Ok(uris.into_iter().collect())
    }

    /// Get a link by ID regardless of owner
    pub async fn get_link(&self, id: LinkId) -> Result<Option<Link>> {
        let row = sqlx::query_as::<_, LinkRow>(&format!(
            "SELECT {} FROM links l WHERE l.id = ?",
            LINK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("get link", e))?;

        Ok(row.map(Link::try_from).transpose()?)
    }

    /// Get a link by ID if its subscription belongs to `owner`
    pub async fn get_owned_link(&self, owner: OwnerId, id: LinkId) -> Result<Option<Link>> {
        let row = sqlx::query_as::<_, LinkRow>(&format!(
            r#"
            SELECT {} FROM links l
            JOIN subscriptions s ON s.id = l.subscription_id
            WHERE l.id = ? AND s.owner_id = ?
            "#,
            LINK_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("get link", e))?;

        Ok(row.map(Link::try_from).transpose()?)
    }

    /// One page of an owner's links, newest first, plus the total count
    pub async fn list_links(
        &self,
        owner: OwnerId,
        subscription_id: Option<SubscriptionId>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Link>, i64)> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM links l
            JOIN subscriptions s ON s.id = l.subscription_id
            WHERE s.owner_id = ? AND (? IS NULL OR l.subscription_id = ?)
            "#,
        )
        .bind(owner)
        .bind(subscription_id)
        .bind(subscription_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| query_failed("count links", e))?;

        let rows = sqlx::query_as::<_, LinkRow>(&format!(
            r#"
            SELECT {} FROM links l
            JOIN subscriptions s ON s.id = l.subscription_id
            WHERE s.owner_id = ? AND (? IS NULL OR l.subscription_id = ?)
            ORDER BY l.created_at DESC, l.id DESC
            LIMIT ? OFFSET ?
            "#,
            LINK_COLUMNS
        ))
        .bind(owner)
        .bind(subscription_id)
        .bind(subscription_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list links", e))?;

        Ok((decode_all(rows)?, total))
    }

    /// Pending links that are unclaimed (or whose claim has gone stale), oldest first
    pub async fn list_claimable_links(&self, limit: i64, claim_timeout: Duration) -> Result<Vec<Link>> {
        let cutoff = claim_cutoff(claim_timeout);

        let rows = sqlx::query_as::<_, LinkRow>(&format!(
            r#"
            SELECT {} FROM links l
            WHERE l.download_status = 'pending'
              AND (l.download_claimed_at IS NULL OR l.download_claimed_at < ?)
            ORDER BY l.created_at ASC, l.id ASC
            LIMIT ?
            "#,
            LINK_COLUMNS
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list pending links", e))?;

        Ok(decode_all(rows)?)
    }

    /// All links with a running remote task
    pub async fn list_downloading_links(&self) -> Result<Vec<Link>> {
        let rows = sqlx::query_as::<_, LinkRow>(&format!(
            "SELECT {} FROM links l WHERE l.download_status = 'downloading' ORDER BY l.id ASC",
            LINK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list downloading links", e))?;

        Ok(decode_all(rows)?)
    }

    /// Failed links matching a bulk-retry selection, optionally scoped to one owner
    pub async fn list_failed_links(
        &self,
        owner: Option<OwnerId>,
        selection: FailedSelection<'_>,
    ) -> Result<Vec<Link>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            r#"
            SELECT {} FROM links l
            JOIN subscriptions s ON s.id = l.subscription_id
            WHERE l.download_status = 'failed'
            "#,
            LINK_COLUMNS
        ));

        if let Some(owner) = owner {
            builder.push(" AND s.owner_id = ").push_bind(owner);
        }

        match selection {
            FailedSelection::All => {}
            FailedSelection::Links(ids) => {
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                builder.push(" AND l.id IN (");
                let mut separated = builder.separated(", ");
                for id in ids {
                    separated.push_bind(*id);
                }
                separated.push_unseparated(")");
            }
            FailedSelection::Subscriptions(ids) => {
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                builder.push(" AND l.subscription_id IN (");
                let mut separated = builder.separated(", ");
                for id in ids {
                    separated.push_bind(*id);
                }
                separated.push_unseparated(")");
            }
        }

        builder.push(" ORDER BY l.id ASC");

        let rows = builder
            .build_query_as::<LinkRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("list failed links", e))?;

        Ok(decode_all(rows)?)
    }

    /// Claim a pending link for submission
    ///
    /// Succeeds only if the link is still pending and not claimed by a live
    /// sweep. `false` means someone else owns it.
    pub async fn claim_pending_link(&self, id: LinkId, claim_timeout: Duration) -> Result<bool> {
        let now = Utc::now().timestamp();
        let cutoff = claim_cutoff(claim_timeout);

        let result = sqlx::query(
            r#"
            UPDATE links SET download_claimed_at = ?
            WHERE id = ? AND download_status = 'pending'
              AND (download_claimed_at IS NULL OR download_claimed_at < ?)
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("claim link", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// Drop a claim without changing status
    pub async fn release_link_claim(&self, id: LinkId) -> Result<()> {
        sqlx::query(
            "UPDATE links SET download_claimed_at = NULL WHERE id = ? AND download_status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("release link claim", e))?;

        Ok(())
    }

    /// pending → downloading
    pub async fn mark_link_downloading(
        &self,
        id: LinkId,
        task_id: i64,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE links
            SET download_status = 'downloading', download_task_id = ?, download_created_at = ?,
                download_file_id = NULL, download_fail_reason = NULL,
                download_completed_at = NULL, download_claimed_at = NULL
            WHERE id = ? AND download_status = 'pending'
            "#,
        )
        .bind(task_id)
        .bind(at.timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("mark link downloading", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// pending → failed (submission failed, no task exists)
    pub async fn mark_link_submit_failed(
        &self,
        id: LinkId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE links
            SET download_status = 'failed', download_task_id = NULL, download_file_id = NULL,
                download_fail_reason = ?, download_completed_at = ?, download_claimed_at = NULL
            WHERE id = ? AND download_status = 'pending'
            "#,
        )
        .bind(reason)
        .bind(at.timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("mark link failed", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// downloading → completed
    pub async fn mark_link_completed(
        &self,
        id: LinkId,
        file_id: i64,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE links
            SET download_status = 'completed', download_file_id = ?, download_completed_at = ?
            WHERE id = ? AND download_status = 'downloading'
            "#,
        )
        .bind(file_id)
        .bind(at.timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("mark link completed", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// downloading → failed (remote task failed; the task id is kept)
    pub async fn mark_link_failed(
        &self,
        id: LinkId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE links
            SET download_status = 'failed', download_fail_reason = ?, download_completed_at = ?
            WHERE id = ? AND download_status = 'downloading'
            "#,
        )
        .bind(reason)
        .bind(at.timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("mark link failed", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// failed → pending, clearing every download-tracking field
    ///
    /// The reset link comes back already claimed by the caller, so a
    /// concurrent sweep cannot submit it first.
    pub async fn reset_link_for_retry(&self, id: LinkId) -> Result<bool> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE links
            SET download_status = 'pending', download_task_id = NULL, download_file_id = NULL,
                download_fail_reason = NULL, download_created_at = NULL,
                download_completed_at = NULL, download_claimed_at = ?
            WHERE id = ? AND download_status = 'failed'
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("reset link", e))?;

        Ok(result.rows_affected() > 0)
    }
}

fn claim_cutoff(claim_timeout: Duration) -> i64 {
    Utc::now().timestamp() - claim_timeout.as_secs() as i64
}
