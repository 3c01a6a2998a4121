//! Generic, ClickUp-shaped ticket-tracker connector: hierarchical
//! teams/spaces/lists discovery, historical and incremental task backfills
//! with per-task comment fan-out, a weekly unconditional list-membership
//! sweep, and best-effort pruning of deleted tasks.

mod api;
mod artifacts;
mod batch;
mod full_backfill;
mod incr_backfill;
mod permissions;
mod pruner;
mod sync_state;
mod wire;

pub use api::{TrackerApi, TrackerHttpApi};
pub use artifacts::{tracker_comment_entity_id, tracker_list_membership_entity_id, tracker_task_entity_id};
pub use batch::{TaskBatchArtifacts, TrackerTaskBatchBackfiller};
pub use full_backfill::TrackerFullBackfiller;
pub use incr_backfill::TrackerIncrBackfiller;
pub use permissions::TrackerPermissionBackfiller;
pub use pruner::{TrackerPruneResult, TrackerPruner};
pub use sync_state::TrackerSyncState;
pub use wire::*;
