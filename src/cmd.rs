use anyhow::Result;

/// This trait describes a command.
///
/// Commands run both one-shot from the command line and repeatedly from the
/// interactive shell, so `run` must leave the context usable after an error.
#[async_trait::async_trait]
pub trait Command: Send + Sync {
    async fn run(&self, ctx: &mut crate::context::Context) -> Result<()>;
}
