//! Content cache index: hashes confirmed downloaded and verified in the sandbox.
//!
//! Persisted in SQLite (via sqlx) so it survives restarts. Membership reads are
//! served from an in-memory snapshot without touching the database; writes go
//! through a single async writer lock and reach the snapshot only after the
//! transaction commits.

mod db;

#[cfg(test)]
mod tests;

pub use db::CacheIndex;
