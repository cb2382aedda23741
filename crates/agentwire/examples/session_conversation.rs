//! Stateful session: several turns over one Agent process.

use agentwire::{AgentOptions, Message, Session};

#[tokio::main]
async fn main() -> agentwire::Result<()> {
    let mut session = Session::connect(AgentOptions::new()).await?;

    for prompt in ["My name is Ada.", "What is my name?"] {
        session.send_turn(prompt).await?;
        let mut turn = session.receive_response();
        while let Some(message) = turn.next().await {
            match message? {
                Message::Assistant(reply) => println!("assistant: {}", reply.text()),
                Message::Result(result) => println!("-- {} turns so far", result.num_turns),
                _ => {}
            }
        }
    }

    session.close().await
}
