//! Streamed completion against a locally-hosted LLM API server
//!
//! # Prerequisites
//!
//! 1. Start a server exposing `/generate`, `/agenerate` and `/embeddings` on
//!    port 8000.
//!
//! 2. Set environment variables (optional):
//!    ```bash
//!    export LLM_API_HOST_NAME=http://localhost:8000
//!    export LLM_API_TIMEOUT_SECS=120
//!    ```
//!
//! 3. Run this example:
//!    ```bash
//!    RUST_LOG=llm_api=debug cargo run --example local_completion
//!    ```

use llm_api::prelude::*;
use llm_api::StdoutTokenHandler;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::from_env()?
        .with_param("n_predict", 300)
        .with_param("temp", 0.2)
        .with_streaming(true);
    println!("=== llm-api streamed completion ({}) ===\n", config.host_name);

    let llm = LlmApi::new(config).with_token_handler(Arc::new(StdoutTokenHandler));
    println!("Identifying params: {:?}\n", llm.identifying_params());

    let stop = vec!["\n\n".to_string()];
    match llm.complete("The three primary colors are", Some(&stop)).await {
        Ok(completion) => println!("\n\n{} characters generated", completion.len()),
        Err(e) => {
            eprintln!("Completion failed: {}", e);
            eprintln!("Make sure the server is running at {}", llm.config().host_name);
            return Err(e.into());
        }
    }

    Ok(())
}
