//! Token notification hooks for streaming completions

use async_trait::async_trait;
use std::io::Write;

/// Receives each text fragment as a streaming completion arrives
///
/// Handlers that need to await (e.g., forwarding to a channel or socket) should
/// override [`TokenHandler::on_new_token_async`] and return `true` from
/// [`TokenHandler::is_async`]. The async method is only awaited when the completion
/// itself was started from async code; the blocking wrappers always call
/// [`TokenHandler::on_new_token`].
#[async_trait]
pub trait TokenHandler: Send + Sync {
    /// Called synchronously with each new fragment
    fn on_new_token(&self, token: &str);

    /// Called with each new fragment when [`TokenHandler::is_async`] is true
    async fn on_new_token_async(&self, token: &str) {
        self.on_new_token(token);
    }

    /// Whether the async notification should be awaited
    fn is_async(&self) -> bool {
        false
    }
}

/// Writes every fragment to stdout as it arrives
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutTokenHandler;

impl TokenHandler for StdoutTokenHandler {
    fn on_new_token(&self, token: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(token.as_bytes());
        let _ = stdout.flush();
    }
}
