// Application layer - the interface a presentation layer talks to.
// Mutations apply to the in-memory ledger immediately; persistence runs
// in a background writer.

pub mod error;
pub mod events;
pub mod service;
mod writer;

pub use error::*;
pub use events::*;
pub use service::*;
