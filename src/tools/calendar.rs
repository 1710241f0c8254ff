//! Local calendar stored as JSON in the scratch directory
//!
//! Events are matched for cancellation by title (case-insensitive substring),
//! date, and optionally start time.

use std::path::{Path, PathBuf};

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Longest event that can be scheduled
pub const MAX_DURATION_MINUTES: u32 = 480;

/// Default event length
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

/// A stored calendar event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub title: String,
    pub start: NaiveDateTime,
    pub duration_minutes: u32,
    #[serde(default)]
    pub description: String,
}

impl CalendarEvent {
    /// End of the event
    #[must_use]
    pub fn end(&self) -> NaiveDateTime {
        self.start + Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// Arguments of `create_calendar_event`
#[derive(Debug, Deserialize)]
pub struct CreateEventArgs {
    pub title: String,
    #[serde(default)]
    pub date: Option<String>,
    pub time: String,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Arguments of `cancel_calendar_event`
#[derive(Debug, Deserialize)]
pub struct CancelEventArgs {
    pub title: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

/// JSON-file backed calendar
#[derive(Debug)]
pub struct LocalCalendar {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LocalCalendar {
    /// Calendar stored at `<dir>/calendar.json`
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join("calendar.json"),
            lock: Mutex::new(()),
        }
    }

    /// All stored events, in start order
    ///
    /// # Errors
    ///
    /// Returns a message if the file exists but cannot be read or parsed
    pub async fn events(&self) -> Result<Vec<CalendarEvent>, String> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn load(&self) -> Result<Vec<CalendarEvent>, String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| format!("calendar file is corrupt: {e}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(format!("failed to read calendar: {e}")),
        }
    }

    async fn save(&self, events: &mut Vec<CalendarEvent>) -> Result<(), String> {
        events.sort_by_key(|e| e.start);
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("failed to create calendar dir: {e}"))?;
        }
        let content = serde_json::to_string_pretty(events)
            .map_err(|e| format!("failed to encode calendar: {e}"))?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| format!("failed to write calendar: {e}"))
    }

    /// `create_calendar_event` handler
    ///
    /// # Errors
    ///
    /// Returns a message for malformed dates/times or storage failures
    pub async fn create(&self, args: CreateEventArgs) -> Result<Value, String> {
        let title = require_title(&args.title)?;
        let date = parse_date(args.date.as_deref())?;
        let time = parse_time(&args.time)?;
        let duration = args.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        if duration == 0 || duration > MAX_DURATION_MINUTES {
            return Err(format!(
                "duration must be between 1 and {MAX_DURATION_MINUTES} minutes"
            ));
        }

        let event = CalendarEvent {
            id: Uuid::new_v4(),
            title: title.to_string(),
            start: date.and_time(time),
            duration_minutes: duration,
            description: args.description.unwrap_or_default(),
        };

        let _guard = self.lock.lock().await;
        let mut events = self.load().await?;
        events.push(event.clone());
        self.save(&mut events).await?;

        tracing::info!(title = %event.title, start = %event.start, "calendar event created");
        Ok(json!({
            "status": "scheduled",
            "message": format!(
                "Meeting '{}' scheduled for {} at {} (duration: {} minutes)",
                event.title,
                date.format("%Y-%m-%d"),
                time.format("%H:%M"),
                duration
            ),
            "id": event.id,
        }))
    }

    /// `cancel_calendar_event` handler
    ///
    /// # Errors
    ///
    /// Returns a message for malformed dates/times or storage failures
    pub async fn cancel(&self, args: CancelEventArgs) -> Result<Value, String> {
        let date = parse_date(args.date.as_deref())?;
        let time = args.time.as_deref().map(parse_time).transpose()?;
        let needle = require_title(&args.title)?.to_lowercase();

        let _guard = self.lock.lock().await;
        let mut events = self.load().await?;
        let before = events.len();
        events.retain(|e| {
            let matches = e.title.to_lowercase().contains(&needle)
                && e.start.date() == date
                && time.is_none_or(|t| e.start.time() == t);
            !matches
        });
        let cancelled = before - events.len();

        let when = time.map_or_else(
            || date.format("%Y-%m-%d").to_string(),
            |t| format!("{} at {}", date.format("%Y-%m-%d"), t.format("%H:%M")),
        );

        if cancelled == 0 {
            return Ok(json!({
                "status": "not_found",
                "message": format!("No events found matching '{}' on {when}", args.title),
            }));
        }

        self.save(&mut events).await?;
        tracing::info!(title = %args.title, cancelled, "calendar events cancelled");

        let message = if cancelled == 1 {
            format!("Cancelled the meeting '{}' on {when}", args.title)
        } else {
            format!("Cancelled {cancelled} occurrences of '{}' on {when}", args.title)
        };
        Ok(json!({ "status": "cancelled", "count": cancelled, "message": message }))
    }
}

/// A blank title would match every event on the date
fn require_title(raw: &str) -> Result<&str, String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err("title must not be empty".to_string());
    }
    Ok(title)
}

fn parse_date(raw: Option<&str>) -> Result<NaiveDate, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| format!("date must be YYYY-MM-DD, got {s}")),
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| format!("time must be HH:MM (24-hour), got {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_args(title: &str, time: &str) -> CreateEventArgs {
        CreateEventArgs {
            title: title.to_string(),
            date: Some("2025-06-02".to_string()),
            time: time.to_string(),
            duration_minutes: Some(45),
            description: None,
        }
    }

    #[tokio::test]
    async fn create_then_cancel_by_time() {
        let dir = tempfile::tempdir().unwrap();
        let calendar = LocalCalendar::in_dir(dir.path());

        calendar.create(create_args("Standup", "09:00")).await.unwrap();
        calendar.create(create_args("Standup", "15:00")).await.unwrap();

        let events = calendar.events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].end().format("%H:%M").to_string(), "09:45");

        let out = calendar
            .cancel(CancelEventArgs {
                title: "standup".to_string(),
                date: Some("2025-06-02".to_string()),
                time: Some("15:00".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(out["count"], 1);

        let remaining = calendar.events().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].start.format("%H:%M").to_string(), "09:00");
    }

    #[tokio::test]
    async fn cancel_without_match_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let calendar = LocalCalendar::in_dir(dir.path());

        let out = calendar
            .cancel(CancelEventArgs {
                title: "Review".to_string(),
                date: Some("2025-06-02".to_string()),
                time: None,
            })
            .await
            .unwrap();
        assert_eq!(out["status"], "not_found");
    }

    #[tokio::test]
    async fn rejects_malformed_time() {
        let dir = tempfile::tempdir().unwrap();
        let calendar = LocalCalendar::in_dir(dir.path());

        let err = calendar.create(create_args("Standup", "9am")).await.unwrap_err();
        assert!(err.contains("HH:MM"));
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let calendar = LocalCalendar::in_dir(dir.path());
        calendar.create(create_args("Standup", "09:00")).await.unwrap();

        let err = calendar.create(create_args("   ", "10:00")).await.unwrap_err();
        assert!(err.contains("title"));

        for title in ["", "  "] {
            let err = calendar
                .cancel(CancelEventArgs {
                    title: title.to_string(),
                    date: Some("2025-06-02".to_string()),
                    time: None,
                })
                .await
                .unwrap_err();
            assert!(err.contains("title"));
        }
        assert_eq!(calendar.events().await.unwrap().len(), 1);
    }
}
