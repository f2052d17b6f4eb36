#![deny(unsafe_code)]

//! Chat domain for the streaming assistant session.
//!
//! Everything here is synchronous and free of I/O: frame decoding, event
//! interpretation, the transcript reducer and the exchange state machine.

pub mod events;
pub mod exchange;
/// Server-sent event framing.
pub mod frame;
pub mod ids;
pub mod message;
pub mod transcript;

pub use events::{Directive, EventInterpreter, InterpretError, StreamEvent, parse_event};
pub use exchange::{
    ErrorKind, ExchangeOutcome, ExchangeState, ExchangeTransition, ExchangeTransitionRejection,
    ExchangeTransitionResult,
};
pub use frame::{DATA_PREFIX, DONE_SENTINEL, Frame, FrameDecoder, Frames, MAX_LINE_BYTES};
pub use ids::{MessageId, SessionId, SessionInfo, UserId};
pub use message::{AgentKind, Message, Sender};
pub use transcript::{Transcript, TranscriptRejection, TranscriptUpdate};
