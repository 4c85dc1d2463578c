//! Pipeline coordinator - the only writer into the store and indexes.

pub mod ingest;
pub mod repair;

pub use ingest::{
    ingest_batch, ingest_batch_cancellable, IngestReport, RecordOutcome, RecordState,
};
pub use repair::{find_unindexed, rebuild_indexes, repair_pass};
