//! Post-ingest hook, dispatched after a run has produced its output.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::IngestOutput;

/// Downstream work triggered by a finished ingestion (enrichment, indexing).
///
/// Runs on its own task; failures are logged and never reach the caller.
#[async_trait]
pub trait PostIngestHook: Send + Sync {
    fn name(&self) -> &str;

    async fn after_ingest(&self, output: &IngestOutput) -> Result<()>;
}

/// Spawn the hook on a detached task.
pub fn dispatch(hook: Arc<dyn PostIngestHook>, output: IngestOutput) -> JoinHandle<()> {
    tokio::spawn(async move {
        let run_id = output.diagnostics.run_id;
        match hook.after_ingest(&output).await {
            Ok(()) => debug!(hook = hook.name(), %run_id, "post-ingest hook finished"),
            Err(e) => warn!(hook = hook.name(), %run_id, error = %e, "post-ingest hook failed"),
        }
    })
}
