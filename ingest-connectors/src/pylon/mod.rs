//! Pylon connector: windowed historical issue backfill with a 2-year floor,
//! a short-cadence incremental sync, and a 24-hour-gated reference-data
//! pre-sync (users, teams, accounts, contacts) that issue transformation
//! draws names from.

mod api;
mod artifacts;
mod full_backfill;
mod incr_backfill;
mod reference_data;
mod sync_state;
mod wire;

pub use api::{PylonApi, PylonHttpApi};
pub use artifacts::{
    pylon_account_entity_id, pylon_contact_entity_id, pylon_issue_entity_id, pylon_team_entity_id,
    pylon_user_entity_id,
};
pub use full_backfill::PylonFullBackfiller;
pub use incr_backfill::IncrBackfiller as PylonIncrBackfiller;
pub use reference_data::PylonReferenceData;
pub use sync_state::PylonSyncState;
pub use wire::*;
