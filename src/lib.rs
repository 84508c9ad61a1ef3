//! mixlink - observe a digital mixing console over its MIDI control protocol
//!
//! Turns the console's raw byte stream into typed parameter changes and keeps
//! a reference-counted cache of the parameters consumers are bound to.
//!
//! Pipeline: [`framing`] splits bytes into frames, [`interpret`] maps each
//! frame to a semantic event using the [`address`] table, and the
//! [`state::SubscriptionEngine`] caches and publishes the values somebody
//! subscribed to, formatted by [`format`].

pub mod address;
pub mod config;
pub mod error;
pub mod format;
pub mod framing;
pub mod interpret;
pub mod protocol;
pub mod requests;
pub mod session;
pub mod state;

pub use error::PathError;
pub use framing::{FrameExtractor, RawFrame};
pub use interpret::{interpret, EventKind, SemanticEvent};
pub use protocol::{ChannelAddr, ChannelType, Parameter};
pub use requests::{ConsoleRequester, LoggingRequester, OutboundRequest};
pub use state::{
    EngineEvent, EngineOptions, ParamValue, ParameterPath, SubscriptionEngine, VariableDefinition,
};
