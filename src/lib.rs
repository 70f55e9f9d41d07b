#![deny(clippy::mod_module_files)]
//! A small Git implementation: loose objects, refs, and clone over the
//! smart HTTP protocol.

pub mod config;
pub mod error;
pub mod object;
pub mod pack;
pub mod protocol;
pub mod repository;
pub mod store;

pub use config::Config;
pub use error::{CloneError, CloneStage, Error, Result};
pub use object::{GitObject, Kind, ObjectId};
pub use repository::Repository;
