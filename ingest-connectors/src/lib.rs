//! Per-source extractors: historical and incremental backfills against
//! Asana, Pylon, and a generic ticket tracker, plus the push-style Custom
//! Data ingest path.

pub mod asana;
pub mod custom_data;
pub mod pylon;
pub mod tracker;
