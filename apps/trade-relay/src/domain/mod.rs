//! Domain Layer - Core relay types with no runtime dependencies.
//!
//! This layer contains the canonical trade record, the channel partitioning
//! algorithm, and the connection lifecycle states. Everything here is pure
//! Rust with serialization support.

/// Canonical trade record and exchange identifiers.
pub mod trade;

/// Bounded-size batching of channel identifiers.
pub mod chunking;

/// Connection lifecycle states.
pub mod streaming;
