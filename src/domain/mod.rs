/// Domain module containing the data exchanged between the two transports
///
/// This module defines the identifiers and enumerations that drive routing,
/// the outbound Command, and the inbound ResultEnvelope. These types are shared
/// by the channel, the correlator and the tool dispatcher.

pub mod command;
pub mod envelope;
pub mod types;

// Re-export public types for easy access
pub use command::*;
pub use envelope::*;
pub use types::*;
