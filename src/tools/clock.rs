//! Current date and time

use chrono::{DateTime, Local, TimeZone};
use serde::Deserialize;
use serde_json::{Value, json};

/// `get_current_time` takes no arguments
#[derive(Debug, Deserialize)]
pub struct NoArgs {}

/// Describe `now` the way the model is asked to speak about time
#[must_use]
pub fn describe<Tz: TimeZone>(now: &DateTime<Tz>) -> Value
where
    Tz::Offset: std::fmt::Display,
{
    json!({
        "iso": now.to_rfc3339(),
        "date": now.format("%Y-%m-%d").to_string(),
        "time": now.format("%H:%M").to_string(),
        "weekday": now.format("%A").to_string(),
    })
}

/// `get_current_time` handler
///
/// # Errors
///
/// Never fails
#[allow(clippy::unused_async)]
pub async fn handle_now(_: NoArgs) -> Result<Value, String> {
    Ok(describe(&Local::now()))
}
