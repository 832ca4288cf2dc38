//! Dispatch: warm-up gate, first-match trigger scan, global cooldown and
//! reply construction.

mod dispatcher;
mod state;

pub use dispatcher::{DispatchOutcome, Dispatcher, DispatcherConfig};
