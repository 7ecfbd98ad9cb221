//! Generic Access Profile side of the host
//!
//! Parameter and record types exchanged with the protocol engine, and the
//! traits the engine is driven through.

pub mod constants;
pub mod engine;
pub mod types;

pub use engine::{
    ClientConfigurationHooks, ClientProfile, ConnectionDelegate, GapDelegate, GapLayer,
    LinkConnection, ServerProfile,
};
pub use types::*;
