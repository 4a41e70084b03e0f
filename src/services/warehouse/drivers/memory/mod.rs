//! In-memory warehouse for tests.
//!
//! Understands the statements the table engine generates and nothing more.
//! Link a [`MemoryStore`](crate::services::bucket::MemoryStore) with
//! [`MemoryWarehouse::with_store`] so `COPY` and `UNLOAD` can reach objects
//! written through a `MemoryBucket`.

mod connection;
mod statement;
mod table;

pub use connection::MemoryWarehouse;
