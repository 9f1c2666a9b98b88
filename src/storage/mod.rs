pub mod db;
pub mod models;
mod tables;
mod videos;

pub use db::{Database, DatabaseError, PurgeStats};
pub use tables::*;
