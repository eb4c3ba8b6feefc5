//! gRPC Trade Sink
//!
//! Forwards normalized trades to the downstream `sync.SyncService` over
//! tonic. Message and service stubs are generated from
//! `packages/proto/sync/sync.proto` and checked in under `packages/schema-gen`.

pub mod sink;

// Allow clippy warnings and missing docs in generated code
#[allow(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
pub mod proto {
    pub mod sync {
        include!("../../../../../packages/schema-gen/rust/sync/sync.rs");
        include!("../../../../../packages/schema-gen/rust/sync/sync.tonic.rs");
    }
}

pub use sink::{GrpcSinkConfig, GrpcTradeSink};
