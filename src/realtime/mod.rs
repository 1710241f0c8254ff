//! Realtime conversational session
//!
//! - [`events`]: wire vocabulary
//! - [`configure`]: the `session.update` payload
//! - [`session`]: the state machine driving a conversation
//! - [`dispatch`]: function calls run off the event loop
//! - [`transport`]: the WebSocket connection

pub mod configure;
pub mod dispatch;
pub mod events;
pub mod session;
pub mod transport;

pub use configure::build_session_config;
pub use dispatch::{CallOutcome, Dispatcher};
pub use events::{ClientEvent, ErrorDetail, ServerEvent, SessionConfig};
pub use session::{CallStatus, FunctionCall, SessionMachine, SessionState, Speaker, Turn};
pub use transport::{Connection, Inbound, connect};
