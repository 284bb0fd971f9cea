use async_trait::async_trait;

use crate::pipeline::RunOutput;

/// Hand-off point to whatever loads accepted record sets into storage
#[async_trait]
pub trait RecordSetSinkPort: Send + Sync {
    async fn write_run(&self, output: &RunOutput) -> anyhow::Result<()>;
}
