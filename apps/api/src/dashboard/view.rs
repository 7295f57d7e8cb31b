//! Client view state: the locked/unlocked gate and the subscription bands.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::bot::{BotRecord, PendingAction};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Days at or below which an active subscription is flagged as near expiry.
pub const NEAR_EXPIRY_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionBand {
    Expired,
    NearExpiry,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Locked,
    Unlocked {
        band: SubscriptionBand,
        days_remaining: Option<i64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    Running,
    StoppedManually,
    StoppedSubscription,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneProfile {
    Friendly,
    Professional,
    Formal,
}

/// Whole days left until `end`, rounded up. Negative once the date has passed.
pub fn days_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (end - now).num_milliseconds() as f64;
    (millis / MILLIS_PER_DAY).ceil() as i64
}

pub fn band_for(days_remaining: i64) -> SubscriptionBand {
    if days_remaining <= 0 {
        SubscriptionBand::Expired
    } else if days_remaining <= NEAR_EXPIRY_DAYS {
        SubscriptionBand::NearExpiry
    } else {
        SubscriptionBand::Normal
    }
}

impl ViewState {
    /// A record without an end date has no running subscription and counts as expired.
    pub fn for_record(bot: &BotRecord, now: DateTime<Utc>) -> Self {
        if !bot.is_activated {
            return ViewState::Locked;
        }
        match bot.subscription_end_date {
            Some(end) => {
                let days = days_remaining(end, now);
                ViewState::Unlocked {
                    band: band_for(days),
                    days_remaining: Some(days),
                }
            }
            None => ViewState::Unlocked {
                band: SubscriptionBand::Expired,
                days_remaining: None,
            },
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(
            self,
            ViewState::Unlocked {
                band: SubscriptionBand::Expired,
                ..
            }
        )
    }

    /// Toggles and the alert stream are available only on an unlocked, unexpired bot.
    pub fn controls_enabled(&self) -> bool {
        matches!(self, ViewState::Unlocked { .. }) && !self.is_expired()
    }
}

pub fn status_for(bot: &BotRecord, view: ViewState) -> BotStatus {
    if view.is_expired() {
        BotStatus::StoppedSubscription
    } else if bot.is_active {
        BotStatus::Running
    } else {
        BotStatus::StoppedManually
    }
}

pub fn tone_profile(tone: u8) -> ToneProfile {
    match tone {
        0..=25 => ToneProfile::Friendly,
        75..=u8::MAX => ToneProfile::Formal,
        _ => ToneProfile::Professional,
    }
}

/// What the PWA needs to render either screen.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientView {
    pub bot_id: String,
    pub store_name: String,
    pub bot_name: String,
    pub locked: bool,
    pub band: Option<SubscriptionBand>,
    pub days_remaining: Option<i64>,
    pub controls_enabled: bool,
    pub status: Option<BotStatus>,
    pub is_active: bool,
    pub is_listening: bool,
    pub tone_value: u8,
    pub tone_profile: ToneProfile,
    pub license_key: Option<String>,
    pub activation_date: Option<DateTime<Utc>>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub instagram_connected: bool,
    pub instagram_username: Option<String>,
    pub instagram_connected_at: Option<DateTime<Utc>>,
    /// False when linking fell back to a short-lived token.
    pub instagram_token_long_lived: Option<bool>,
    pub active_alert: Option<PendingAction>,
}

impl ClientView {
    pub fn build(bot: &BotRecord, now: DateTime<Utc>) -> Self {
        let view = ViewState::for_record(bot, now);
        let (band, days_remaining) = match view {
            ViewState::Locked => (None, None),
            ViewState::Unlocked {
                band,
                days_remaining,
            } => (Some(band), days_remaining),
        };
        let unlocked = view != ViewState::Locked;

        ClientView {
            bot_id: bot.id.clone(),
            store_name: bot.store_name.clone(),
            bot_name: bot.bot_name.clone(),
            locked: !unlocked,
            band,
            days_remaining,
            controls_enabled: view.controls_enabled(),
            status: unlocked.then(|| status_for(bot, view)),
            is_active: bot.is_active,
            is_listening: bot.is_listening,
            tone_value: bot.tone_value,
            tone_profile: tone_profile(bot.tone_value),
            // The key is only revealed on the unlocked settings tab.
            license_key: if unlocked { bot.license_key.clone() } else { None },
            activation_date: bot.activation_date,
            subscription_end_date: bot.subscription_end_date,
            instagram_connected: bot.instagram_connected,
            instagram_username: bot.instagram_username.clone(),
            instagram_connected_at: bot.connected_at,
            instagram_token_long_lived: bot.instagram_token_long_lived,
            active_alert: bot
                .pending_action
                .clone()
                .filter(|action| view.controls_enabled() && action.is_hot_lead()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn activated(end: Option<DateTime<Utc>>) -> BotRecord {
        BotRecord {
            id: "bot-1".to_string(),
            is_activated: true,
            subscription_end_date: end,
            license_key: Some("RWB-1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_days_remaining_rounds_up() {
        let now = Utc::now();
        assert_eq!(days_remaining(now + Duration::days(2), now), 2);
        assert_eq!(days_remaining(now + Duration::hours(25), now), 2);
        assert_eq!(days_remaining(now + Duration::hours(1), now), 1);
        assert_eq!(days_remaining(now, now), 0);
        assert_eq!(days_remaining(now - Duration::days(1), now), -1);
    }

    #[test]
    fn test_band_thresholds() {
        assert_eq!(band_for(-5), SubscriptionBand::Expired);
        assert_eq!(band_for(0), SubscriptionBand::Expired);
        assert_eq!(band_for(1), SubscriptionBand::NearExpiry);
        assert_eq!(band_for(3), SubscriptionBand::NearExpiry);
        assert_eq!(band_for(4), SubscriptionBand::Normal);
    }

    #[test]
    fn test_not_activated_is_locked() {
        let bot = BotRecord::default();
        let view = ViewState::for_record(&bot, Utc::now());
        assert_eq!(view, ViewState::Locked);
        assert!(!view.controls_enabled());
    }

    #[test]
    fn test_two_days_left_is_near_expiry_with_controls() {
        let now = Utc::now();
        let view = ClientView::build(&activated(Some(now + Duration::days(2))), now);
        assert_eq!(view.days_remaining, Some(2));
        assert_eq!(view.band, Some(SubscriptionBand::NearExpiry));
        assert!(view.controls_enabled);
    }

    #[test]
    fn test_yesterday_is_expired_and_controls_disabled() {
        let now = Utc::now();
        let view = ClientView::build(&activated(Some(now - Duration::days(1))), now);
        assert_eq!(view.band, Some(SubscriptionBand::Expired));
        assert!(!view.controls_enabled);
        assert_eq!(view.status, Some(BotStatus::StoppedSubscription));
    }

    #[test]
    fn test_missing_end_date_counts_as_expired() {
        let view = ViewState::for_record(&activated(None), Utc::now());
        assert!(view.is_expired());
    }

    #[test]
    fn test_locked_view_hides_license_key() {
        let bot = BotRecord {
            license_key: Some("RWB-SECRET".to_string()),
            ..Default::default()
        };
        let view = ClientView::build(&bot, Utc::now());
        assert!(view.locked);
        assert!(view.license_key.is_none());
        assert!(view.status.is_none());
    }

    #[test]
    fn test_status_labels() {
        let now = Utc::now();
        let mut bot = activated(Some(now + Duration::days(30)));
        bot.is_active = true;
        let view = ViewState::for_record(&bot, now);
        assert_eq!(status_for(&bot, view), BotStatus::Running);
        bot.is_active = false;
        assert_eq!(status_for(&bot, view), BotStatus::StoppedManually);
    }

    #[test]
    fn test_tone_profiles() {
        assert_eq!(tone_profile(0), ToneProfile::Friendly);
        assert_eq!(tone_profile(25), ToneProfile::Friendly);
        assert_eq!(tone_profile(50), ToneProfile::Professional);
        assert_eq!(tone_profile(74), ToneProfile::Professional);
        assert_eq!(tone_profile(75), ToneProfile::Formal);
        assert_eq!(tone_profile(100), ToneProfile::Formal);
    }
}
