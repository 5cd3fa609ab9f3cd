pub mod branch;
pub mod clock;
pub mod config;
pub mod edits;
pub mod index;
pub mod persist;
pub mod run;
pub mod store;
pub mod validate;
