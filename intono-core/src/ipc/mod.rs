//! Serializable event types for front ends.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so an adapter
//! can forward them as JSON (the CLI prints them as JSON lines).

pub mod events;
