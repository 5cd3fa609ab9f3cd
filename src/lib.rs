//! Tabletop Engine — authoring and playback core for branching tabletop
//! exercise scenarios.
//!
//! A scenario is a tree of phase modules holding timed injects and
//! discussion questions. Editing goes through a snapshot-based mutation
//! store with bounded undo/redo; playback goes through a branch engine that
//! turns the linear inject sequence into a navigable decision graph.

pub mod core;
pub mod schema;
