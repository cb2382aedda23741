//! One-shot query: ask a question, print the streamed answer.
//!
//! Run with the Agent CLI installed:
//! ```sh
//! cargo run --example simple_query
//! ```

use agentwire::{query, AgentOptions, Message};

#[tokio::main]
async fn main() -> agentwire::Result<()> {
    let options = AgentOptions::new().with_max_turns(1);
    let mut stream = query("What is the capital of France?", options).await?;

    while let Some(message) = stream.next().await {
        match message? {
            Message::Assistant(reply) => println!("{}", reply.text()),
            Message::Result(result) => {
                println!(
                    "-- turn finished in {} ms (cost: {:?})",
                    result.duration_ms, result.total_cost_usd
                );
            }
            _ => {}
        }
    }

    Ok(())
}
