//! Line-oriented console front end for a session.

pub mod commands;
mod render;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::client::{Connector, SessionChannel, SessionEvent};

pub use commands::{execute_command, CommandResult};
pub use render::describe;

/// Drive an already connected channel from stdin until the player quits
/// or the session closes.
pub async fn run<C: Connector>(channel: &mut SessionChannel<C>) -> std::io::Result<()> {
    let mut events = channel.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Joined session. Type /help for commands.");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed");
                    break;
                };
                match execute_command(channel, &line) {
                    CommandResult::Ok(Some(message)) => println!("{}", message),
                    CommandResult::Ok(None) => {}
                    CommandResult::Error(message) => eprintln!("{}", message),
                    CommandResult::Quit => break,
                }
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Some(text) = describe(&event) {
                    println!("{}", text);
                }
                if matches!(event, SessionEvent::Closed { .. }) {
                    break;
                }
            }
        }
    }

    channel.disconnect().await;
    Ok(())
}
