//! Data types, split by where they are used.
//!
//! - `api`: request and response bodies.
//! - `common`: types shared by all layers.
//! - `db`: documents as they are stored.
//! - `mongodb`: database plumbing.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
