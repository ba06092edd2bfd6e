//! Owner-scoped subscription management.

use crate::error::{Error, Result};
use crate::types::{NewSubscription, OwnerId, Subscription, SubscriptionId, SubscriptionPatch};
use tracing::{info, warn};

use super::MagnetBridge;

impl MagnetBridge {
    /// Create a subscription and provision its cloud folder
    ///
    /// The folder is created first; if that fails nothing is stored.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] for bad input and [`Error::Remote`] if the
    /// folder cannot be created.
    pub async fn create_subscription(
        &self,
        owner: OwnerId,
        new: NewSubscription,
    ) -> Result<Subscription> {
        let new = normalize_new(new);
        validate_feed_url(&new.feed_url)?;
        validate_interval(new.refresh_interval)?;
        validate_folder_name("parent_folder_name", &new.parent_folder_name)?;
        validate_folder_name("cloud_folder_name", &new.cloud_folder_name)?;
        if new.parent_folder_id < 0 {
            return Err(Error::Validation(
                "parent_folder_id must not be negative".into(),
            ));
        }

        let folder_id = self
            .remote
            .create_folder(&new.cloud_folder_name, new.parent_folder_id)
            .await
            .map_err(|e| {
                warn!(owner = %owner, folder = %new.cloud_folder_name, error = %e, "cloud folder creation failed");
                Error::Remote(e)
            })?;

        let subscription = self.db.insert_subscription(owner, &new, folder_id).await?;
        info!(
            owner = %owner,
            subscription_id = %subscription.id,
            folder_id,
            url = %subscription.feed_url,
            "subscription created"
        );
        Ok(subscription)
    }

    /// Get one of the owner's subscriptions
    pub async fn get_subscription(&self, owner: OwnerId, id: SubscriptionId) -> Result<Subscription> {
        self.db
            .get_owned_subscription(owner, id)
            .await?
            .ok_or_else(|| subscription_not_found(id))
    }

    /// List the owner's subscriptions, newest first
    ///
    /// `search` matches the parent or subscription folder name.
    pub async fn list_subscriptions(
        &self,
        owner: OwnerId,
        search: Option<&str>,
    ) -> Result<Vec<Subscription>> {
        self.db.list_subscriptions(owner, search).await
    }

    /// Apply a partial update
    pub async fn update_subscription(
        &self,
        owner: OwnerId,
        id: SubscriptionId,
        patch: SubscriptionPatch,
    ) -> Result<Subscription> {
        let mut subscription = self.get_subscription(owner, id).await?;

        if let Some(url) = patch.feed_url {
            let url = url.trim().to_string();
            validate_feed_url(&url)?;
            subscription.feed_url = url;
        }
        if let Some(name) = patch.parent_folder_name {
            validate_folder_name("parent_folder_name", &name)?;
            subscription.parent_folder_name = name.trim().to_string();
        }
        if let Some(name) = patch.cloud_folder_name {
            validate_folder_name("cloud_folder_name", &name)?;
            subscription.cloud_folder_name = name.trim().to_string();
        }
        if let Some(interval) = patch.refresh_interval {
            validate_interval(interval)?;
            subscription.refresh_interval = interval;
        }
        if let Some(unit) = patch.refresh_unit {
            subscription.refresh_unit = unit;
        }
        if let Some(active) = patch.is_active {
            subscription.is_active = active;
        }

        if !self.db.update_subscription(&subscription).await? {
            return Err(subscription_not_found(id));
        }
        self.get_subscription(owner, id).await
    }

    /// Flip the active flag and return the updated subscription
    pub async fn toggle_subscription(&self, owner: OwnerId, id: SubscriptionId) -> Result<Subscription> {
        if !self.db.toggle_subscription(owner, id).await? {
            return Err(subscription_not_found(id));
        }
        let subscription = self.get_subscription(owner, id).await?;
        info!(subscription_id = %id, active = subscription.is_active, "subscription toggled");
        Ok(subscription)
    }

    /// Delete a subscription and all of its links
    pub async fn delete_subscription(&self, owner: OwnerId, id: SubscriptionId) -> Result<()> {
        if !self.db.delete_subscription(owner, id).await? {
            return Err(subscription_not_found(id));
        }
        info!(subscription_id = %id, "subscription deleted");
        Ok(())
    }
}

fn subscription_not_found(id: SubscriptionId) -> Error {
    Error::NotFound(format!("subscription {} not found", id))
}

fn normalize_new(mut new: NewSubscription) -> NewSubscription {
    new.feed_url = new.feed_url.trim().to_string();
    new.parent_folder_name = new.parent_folder_name.trim().to_string();
    new.cloud_folder_name = new.cloud_folder_name.trim().to_string();
    new
}

/// Feed URLs must be absolute http(s) URLs with a host
pub(crate) fn validate_feed_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| Error::Validation(format!("invalid feed URL '{}': {}", raw, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Validation(format!(
            "feed URL must use http or https, got '{}'",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::Validation("feed URL has no host".into()));
    }
    Ok(())
}

fn validate_interval(interval: u32) -> Result<()> {
    if interval == 0 {
        return Err(Error::Validation(
            "refresh_interval must be at least 1".into(),
        ));
    }
    Ok(())
}

fn validate_folder_name(field: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}
