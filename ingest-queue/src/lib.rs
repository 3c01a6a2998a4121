//! Work-queue message schema, visibility-timeout queue, and cron scheduler
//! driving ingestion jobs.

mod message;
mod queue;
mod scheduler;

pub use message::{BackfillEnvelope, CustomDataDocumentPayload, IngestMessage, QueuedMessage};
pub use queue::{InMemoryWorkQueue, ReceiptHandle, WorkQueue};
pub use scheduler::{CronJob, JobDispatcher, Scheduler};
