//! Beacon Realtime - Voice client for realtime conversational AI
//!
//! This library provides the core functionality for the realtime client:
//! - Microphone capture and speaker playback at 24 kHz mono PCM16
//! - A session state machine speaking the realtime event protocol
//! - Local functions the model can call (files, calendar, browser, clock)
//! - Personalized instructions and terminal feedback
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Assistant                         │
//! │   Microphone  │  Speaker  │  Feedback  │  Ctrl-C      │
//! └────────────────────┬─────────────────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────────────────┐
//! │                  Session machine                      │
//! │   Turns  │  Responses  │  Barge-in  │  Function calls │
//! └────────────────────┬─────────────────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────────────────┐
//! │              Realtime endpoint (WebSocket)            │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod assistant;
pub mod config;
pub mod error;
pub mod feedback;
pub mod personalization;
pub mod realtime;
pub mod tools;
pub mod voice;

pub use assistant::Assistant;
pub use config::Config;
pub use error::{Error, Result};
pub use feedback::{ActivityState, NoFeedback, TerminalMeter, VisualFeedback};
pub use personalization::Personalization;
pub use realtime::{SessionMachine, SessionState};
pub use tools::{FunctionRegistry, builtin_registry};
