//! Pause between two mutated tables.
//!
//! Every `MODIFY TTL` schedules background work on the server; spacing the
//! statements out keeps a large batch from piling up mutations at once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::config::RetentionConfig;

#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

/// Sleeps for a fixed duration on the tokio timer.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

#[async_trait]
impl Pacer for FixedDelay {
    async fn pause(&self) {
        tokio::time::sleep(self.0).await;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl Pacer for NoDelay {
    async fn pause(&self) {}
}

/// The pacer for a run: `NoDelay` for previews or a zero delay.
pub fn pacer_for(config: &RetentionConfig) -> Arc<dyn Pacer> {
    if config.dry_run || config.pacing_delay.is_zero() {
        Arc::new(NoDelay)
    } else {
        Arc::new(FixedDelay(config.pacing_delay))
    }
}
