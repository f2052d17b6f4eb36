#![deny(unsafe_code)]

//! Async side of the chat client: configuration, the HTTP transport, and the
//! session controller that turns a streamed response into transcript updates.

pub mod config;
pub mod error;
pub mod observer;
pub mod session;
pub mod transport;
pub mod watchdog;

pub use config::{ChatConfig, ConfigError};
pub use error::{ExchangeError, ExchangeResult, SessionError, SessionResult, TransportError};
pub use observer::{FinishReason, SessionObserver, TracingObserver};
pub use session::{ChatSession, SessionHandle, SessionSnapshot, SessionStart, SessionWorker};
pub use transport::{BoxFuture, ByteStream, ChatRequest, ChatTransport, HttpTransport};
pub use watchdog::Watchdog;
