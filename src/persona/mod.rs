//! Personas: named bundles of trigger patterns and reply assets.
//!
//! Each persona lives in its own directory under the personas root. The
//! registry loads them all at startup and exposes a single ordered list of
//! trigger bindings to the dispatcher.

pub mod assets;
pub mod model;
pub mod registry;
pub mod types;

pub use registry::PersonaRegistry;
