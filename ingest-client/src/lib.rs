//! Rate-limited HTTP client infrastructure shared by source connectors:
//! connection-pool construction, per-tenant token-bucket limiters, uniform
//! retry handling, and pagination helpers that connectors plug their wire
//! models into.

mod client;
mod limiter;
mod pages;
mod retry;
mod sweep;
mod vendor_error;

pub use client::*;
pub use limiter::*;
pub use pages::*;
pub use retry::*;
pub use sweep::*;
pub use vendor_error::*;
