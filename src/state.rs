//! Subscription and cache engine
//!
//! Tracks which consumers care about which console parameters, keeps the
//! last known value of each subscribed parameter, and publishes changes
//! decoded from the console's byte stream.

mod engine;
mod types;
pub mod variables;

pub use engine::{EngineOptions, SubscriptionEngine};
pub use types::{ConsumerId, EngineEvent, ParamValue, ParameterPath, VariableDefinition};
