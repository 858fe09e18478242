pub mod yte;

pub use yte::{YteInfoTool, YteTool};

use anyhow::Result;

/// Tool trait for agent-orchestrated operations.
///
/// Not object-safe (associated types). The agent calls tools by
/// concrete type, not `dyn Tool`.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    type Input: Send;
    type Output: Send;

    fn name(&self) -> &str;
    async fn run(&self, input: Self::Input) -> Result<Self::Output>;
}
