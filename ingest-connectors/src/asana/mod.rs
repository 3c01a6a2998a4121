//! Asana connector: historical and incremental task backfills, project/team
//! permission snapshots, and best-effort pruning of deleted tasks.

mod api;
mod artifacts;
mod batch;
mod full_backfill;
mod incr_backfill;
mod permissions;
mod pruner;
mod sync_state;
mod wire;

pub use api::{AsanaApi, AsanaHttpApi, EventPage};
pub use artifacts::{
    asana_project_permissions_entity_id, asana_story_entity_id, asana_task_entity_id,
    asana_team_permissions_entity_id, AsanaTeamWithUsers,
};
pub use batch::{AsanaTaskBatchBackfiller, TaskBatchArtifacts};
pub use full_backfill::FullBackfiller;
pub use incr_backfill::IncrBackfiller;
pub use permissions::{AllPermissionsBackfiller, ArtifactLookup, AsanaPermissionBackfiller};
pub use pruner::{AsanaPruneResult, AsanaPruner};
pub use sync_state::AsanaSyncState;
pub use wire::*;
