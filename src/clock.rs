//! Refresh gating for subscriptions

use crate::types::{RefreshUnit, Subscription};
use chrono::{DateTime, Utc};

/// Whether a feed last refreshed at `last_refresh` is due again at `now`
///
/// A subscription that was never refreshed is always due. Otherwise it is due
/// once the whole minutes elapsed reach the interval normalized to minutes.
pub fn should_refresh(
    last_refresh: Option<DateTime<Utc>>,
    interval: u32,
    unit: RefreshUnit,
    now: DateTime<Utc>,
) -> bool {
    match last_refresh {
        None => true,
        Some(last) => (now - last).num_minutes() >= unit.to_minutes(interval),
    }
}

/// Whether `subscription` should be refreshed now; `forced` bypasses the interval
pub fn is_due(subscription: &Subscription, now: DateTime<Utc>, forced: bool) -> bool {
    forced
        || should_refresh(
            subscription.last_refresh,
            subscription.refresh_interval,
            subscription.refresh_unit,
            now,
        )
}
