pub mod client;
pub mod retry;

use flashfusion_core::config::LlmConfig;
use flashfusion_core::error::Result;
use flashfusion_core::traits::LlmClient;

pub use client::InvokeClient;
pub use retry::RetryingClient;

/// Create the default LLM client: the invoke-endpoint client wrapped in
/// the retry policy from the configuration.
pub fn create_client(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    let inner = InvokeClient::new(config)?;
    Ok(Box::new(RetryingClient::new(
        Box::new(inner),
        config.retry.clone(),
    )))
}
