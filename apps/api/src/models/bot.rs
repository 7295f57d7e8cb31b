use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Tag of the pending action raised when a conversation needs a human to close the sale.
pub const HOT_LEAD: &str = "HOT_LEAD";

const DEFAULT_TONE: u8 = 50;

/// The fields of a bot document this service reads.
///
/// Field names are camelCase on the wire so the PWA and the store share one
/// document shape. Records are created elsewhere and carry more than this
/// (knowledge base, credentials, ...); writes are merges, so unread fields survive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotRecord {
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub store_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub bot_name: String,
    pub license_key: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub is_activated: bool,
    #[serde(deserialize_with = "lenient_datetime")]
    pub activation_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_datetime")]
    pub subscription_end_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub is_listening: bool,
    #[serde(deserialize_with = "lenient_tone")]
    pub tone_value: u8,
    pub pending_action: Option<PendingAction>,
    #[serde(deserialize_with = "null_as_default")]
    pub instagram_connected: bool,
    pub instagram_username: Option<String>,
    pub instagram_token_long_lived: Option<bool>,
    #[serde(deserialize_with = "lenient_datetime")]
    pub connected_at: Option<DateTime<Utc>>,
}

impl Default for BotRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            store_name: String::new(),
            bot_name: String::new(),
            license_key: None,
            is_activated: false,
            activation_date: None,
            subscription_end_date: None,
            is_active: false,
            is_listening: false,
            tone_value: DEFAULT_TONE,
            pending_action: None,
            instagram_connected: false,
            instagram_username: None,
            instagram_token_long_lived: None,
            connected_at: None,
        }
    }
}

// Records are written by other clients too, so reads are forgiving: `null`
// falls back to the default and dates may come in several shapes.

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts RFC 3339 timestamps, zone-less timestamps and bare `YYYY-MM-DD`
/// dates (read as UTC), epoch milliseconds, and `{seconds, nanoseconds}`
/// timestamp objects. Anything else reads as absent.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_datetime))
}

fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Some(parsed.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(Utc.from_utc_datetime(&naive));
            }
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
            Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
        }
        Value::Number(millis) => Utc.timestamp_millis_opt(millis.as_i64()?).single(),
        Value::Object(fields) => {
            let seconds = fields
                .get("seconds")
                .or_else(|| fields.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = fields
                .get("nanoseconds")
                .or_else(|| fields.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, nanos).single()
        }
        _ => None,
    }
}

/// Rounds and clamps the slider value into 0..=100; unreadable values use the default.
fn lenient_tone<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let tone = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(tone
        .filter(|t| t.is_finite())
        .map(|t| t.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(DEFAULT_TONE))
}

/// An unacknowledged event attached to a bot, e.g. a hot lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub user_message: String,
}

impl PendingAction {
    pub fn is_hot_lead(&self) -> bool {
        self.kind == HOT_LEAD
    }
}

/// The Instagram fields written after a successful account link.
/// Always merged as one patch so the fields land together.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstagramLink {
    pub instagram_connected: bool,
    pub instagram_access_token: String,
    /// Mirrors `instagramAccessToken`; older dashboard builds read this key.
    pub long_lived_token: String,
    pub instagram_token_long_lived: bool,
    pub instagram_business_id: String,
    pub instagram_page_id: String,
    pub instagram_username: String,
    pub connected_at: DateTime<Utc>,
}
