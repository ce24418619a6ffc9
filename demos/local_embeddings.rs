//! Embeddings from a locally-hosted LLM API server
//!
//! ```bash
//! cargo run --example local_embeddings
//! ```

use llm_api::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let embeddings = ApiEmbeddings::from_env()?;
    println!("=== llm-api embeddings ({}) ===\n", embeddings.config().host_name);

    let texts = [
        "The Golden Gate Bridge is located in San Francisco",
        "Mount Everest is the highest mountain in the world",
    ];

    let vectors = embeddings.embed_many_blocking(&texts)?;
    for (text, vector) in texts.iter().zip(&vectors) {
        println!("{} dimensions: {}", vector.len(), text);
        println!("  first values: {:?}", &vector[..5.min(vector.len())]);
    }

    Ok(())
}
