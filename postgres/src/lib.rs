//! `PostgreSQL` inventory store for Nexus.
//!
//! This crate provides a PostgreSQL-backed implementation of the
//! `InventoryStore` and `CatalogStore` traits from `nexus-core`. It uses sqlx
//! runtime queries and supports:
//!
//! - Conditional reservation and binding in one transaction
//! - Atomic replay view counting
//! - Catalog administration with guarded deletes
//! - Embedded schema migrations
//!
//! # Example
//!
//! ```ignore
//! use nexus_postgres::PostgresInventoryStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = sqlx::PgPool::connect("postgres://localhost/nexus").await?;
//!     let store = PostgresInventoryStore::new(pool);
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod rows;
mod store;

pub use store::PostgresInventoryStore;
