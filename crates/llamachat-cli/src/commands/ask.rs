//! Ask command - one streamed answer, no history.

use llamachat_core::{ChatConfig, ChatSession};

use crate::backend::Backend;

pub(crate) async fn run(config: &ChatConfig, message: &str) -> miette::Result<()> {
    let message = message.trim();
    if message.is_empty() {
        return Err(miette::miette!("Nothing to ask"));
    }

    let backend = Backend::connect(config).await?;

    let mut session = ChatSession::new(config.system_message.as_str());
    session.push_user(message);

    backend
        .generate(&session, config)
        .await
        .map_err(|e| miette::miette!("Generation failed: {}", e))?;

    Ok(())
}
