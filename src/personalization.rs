//! User and assistant personalization
//!
//! Loaded once at startup from a JSON file and turned into the session
//! instructions.

use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Personalization data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Personalization {
    /// Name the assistant answers to
    pub assistant_name: String,

    /// How the assistant addresses the user
    pub user_name: Option<String>,

    /// Free-form facts about the user
    pub profile: Option<String>,

    /// Desired response style (e.g. "brief and casual")
    pub response_style: String,

    /// Voice override
    pub voice: Option<String>,

    /// Appended verbatim to the instructions
    pub extra_instructions: Option<String>,
}

impl Default for Personalization {
    fn default() -> Self {
        Self {
            assistant_name: "Beacon".to_string(),
            user_name: None,
            profile: None,
            response_style: "concise, friendly and conversational".to_string(),
            voice: None,
            extra_instructions: None,
        }
    }
}

impl Personalization {
    /// Load from `path`; a missing file yields the defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let parsed = serde_json::from_str(&content)?;
                tracing::info!(path = %path.display(), "loaded personalization");
                Ok(parsed)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no personalization file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// System instructions for the realtime session
    #[must_use]
    pub fn instructions(&self) -> String {
        let mut out = format!(
            "You are {}, a voice assistant. Keep your responses {}. \
             You are speaking out loud, so avoid markdown, lists and code blocks.",
            self.assistant_name, self.response_style
        );

        if let Some(user) = self.user_name.as_deref().filter(|s| !s.trim().is_empty()) {
            let _ = write!(out, "\n\nThe user's name is {}.", user.trim());
        }
        if let Some(profile) = self.profile.as_deref().filter(|s| !s.trim().is_empty()) {
            let _ = write!(out, "\n\nAbout the user:\n{}", profile.trim());
        }

        out.push_str(
            "\n\nUse the available functions when the user asks you to act on files, \
             open web pages, check the time or manage their calendar. \
             Briefly confirm what you did once a function returns.",
        );

        if let Some(extra) = self
            .extra_instructions
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            let _ = write!(out, "\n\n{}", extra.trim());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = Personalization::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(p, Personalization::default());
    }

    #[test]
    fn partial_file_overlays_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("me.json");
        std::fs::write(&path, r#"{"user_name": "Sam", "voice": "verse"}"#).unwrap();

        let p = Personalization::load(&path).unwrap();
        assert_eq!(p.assistant_name, "Beacon");
        assert_eq!(p.user_name.as_deref(), Some("Sam"));
        assert_eq!(p.voice.as_deref(), Some("verse"));
        assert!(p.instructions().contains("The user's name is Sam."));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Personalization::load(&path).is_err());
    }

    #[test]
    fn blank_optional_sections_are_skipped() {
        let p = Personalization {
            profile: Some("   ".to_string()),
            ..Personalization::default()
        };
        assert!(!p.instructions().contains("About the user"));
    }
}
