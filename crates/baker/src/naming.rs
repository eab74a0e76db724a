//! Default asset names

use chrono::{DateTime, Local, TimeZone};

/// Characters outside `[A-Za-z0-9_-]` become `_`
pub fn sanitize_asset_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "Unnamed".to_string()
    } else {
        cleaned
    }
}

/// `Mocap_<ActorName>_<YYYYmmdd_HHMMSS>`
pub fn asset_name_at<Tz: TimeZone>(actor_name: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "Mocap_{}_{}",
        sanitize_asset_name(actor_name),
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Default name stamped with the local wall clock
pub fn default_asset_name(actor_name: &str) -> String {
    asset_name_at(actor_name, &Local::now())
}
