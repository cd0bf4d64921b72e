pub mod filter;
pub mod gateway;
pub mod models;
pub mod property_repository;

pub use gateway::{Database, DatabaseError};
