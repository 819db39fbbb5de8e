//! Console command parser and executor.
//!
//! Handles player commands like `/answer`, `/item`, `/next`. Any line that
//! does not start with `/` is sent as chat.

use crate::client::{Connector, RoundPhase, SessionChannel, SessionSnapshot};
use crate::models::ItemKind;

/// Result of executing a command.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    /// Command executed successfully with optional message.
    Ok(Option<String>),
    /// Command failed with an error message.
    Error(String),
    /// Leave the session.
    Quit,
}

/// Parse and execute one console line.
pub fn execute_command<C: Connector>(channel: &SessionChannel<C>, input: &str) -> CommandResult {
    let input = input.trim();
    if input.is_empty() {
        return CommandResult::Ok(None);
    }

    let Some(command_line) = input.strip_prefix('/') else {
        channel.send_chat(input);
        return CommandResult::Ok(None);
    };

    let parts: Vec<&str> = command_line.split_whitespace().collect();
    let Some(first) = parts.first() else {
        return CommandResult::Error("Empty command. Type /help for available commands.".to_string());
    };
    let command = first.to_lowercase();
    let args = &parts[1..];

    match command.as_str() {
        "answer" | "a" => cmd_answer(channel, args),
        "item" | "use" => cmd_item(channel, args),
        "next" => cmd_next(channel),
        "players" => cmd_players(&channel.snapshot()),
        "scores" => cmd_scores(&channel.snapshot()),
        "items" => cmd_items(&channel.snapshot()),
        "quit" | "exit" => CommandResult::Quit,
        "help" | "?" => cmd_help(),
        _ => CommandResult::Error(format!(
            "Unknown command: /{}. Type /help for available commands.",
            command
        )),
    }
}

/// Answer the current question by choice text or by its 1-based number.
fn cmd_answer<C: Connector>(channel: &SessionChannel<C>, args: &[&str]) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: /answer <choice>".to_string());
    }

    let snapshot = channel.snapshot();
    let Some(question) = snapshot.session.question() else {
        return CommandResult::Error("No question is active.".to_string());
    };
    if snapshot.session.answer().submitted {
        return CommandResult::Error("You already answered this question.".to_string());
    }
    if !matches!(snapshot.round, RoundPhase::Running { .. }) {
        return CommandResult::Error("Time is up for this question.".to_string());
    }

    let wanted = args.join(" ");
    let choice = wanted
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| question.choices.get(i))
        .or_else(|| question.choices.iter().find(|c| c.eq_ignore_ascii_case(&wanted)));

    match choice {
        Some(choice) => {
            channel.submit_answer(choice.clone());
            CommandResult::Ok(Some(format!("Answered: {}", choice)))
        }
        None => CommandResult::Error(format!("Not a choice: {}", wanted)),
    }
}

/// Use an item, optionally on another player.
fn cmd_item<C: Connector>(channel: &SessionChannel<C>, args: &[&str]) -> CommandResult {
    let Some(kind) = args.first() else {
        return CommandResult::Error("Usage: /item <cannon|torpedo|shield> [player]".to_string());
    };

    let item = match kind.parse::<ItemKind>() {
        Ok(item) => item,
        Err(e) => return CommandResult::Error(e.to_string()),
    };

    let target = args.get(1).map(|t| t.to_string());
    if item.requires_target() && target.is_none() {
        return CommandResult::Error(format!("Usage: /item {} <player>", kind.to_lowercase()));
    }

    let snapshot = channel.snapshot();
    if !snapshot.session.local_items().contains(&item) {
        return CommandResult::Error(format!("You have no {} left.", item));
    }

    channel.use_item(item, target.clone());
    match target.filter(|_| item.requires_target()) {
        Some(target) => CommandResult::Ok(Some(format!("Using {} on {}", item, target))),
        None => CommandResult::Ok(Some(format!("Using {}", item))),
    }
}

/// Ask for the next question.
fn cmd_next<C: Connector>(channel: &SessionChannel<C>) -> CommandResult {
    let snapshot = channel.snapshot();
    let is_host = snapshot.session.identity().is_some_and(|i| i.is_host);
    if !is_host {
        return CommandResult::Error("Only the host can advance the game.".to_string());
    }
    channel.request_next_question();
    CommandResult::Ok(Some("Requested next question.".to_string()))
}

/// List players in the session.
fn cmd_players(snapshot: &SessionSnapshot) -> CommandResult {
    let players = snapshot.session.players();
    if players.is_empty() {
        return CommandResult::Ok(Some("No players yet.".to_string()));
    }

    let names: Vec<String> = players
        .iter()
        .map(|p| {
            if snapshot.session.is_local_player(&p.name) {
                format!("{} (you)", p.name)
            } else {
                p.name.clone()
            }
        })
        .collect();
    CommandResult::Ok(Some(format!("Players: {}", names.join(", "))))
}

/// Show the leaderboard.
fn cmd_scores(snapshot: &SessionSnapshot) -> CommandResult {
    let leaderboard = snapshot.session.leaderboard();
    if leaderboard.is_empty() {
        return CommandResult::Ok(Some("No scores yet.".to_string()));
    }

    let lines: Vec<String> = leaderboard
        .iter()
        .enumerate()
        .map(|(rank, entry)| format!("{:>2}. {:<16} {:>6}", rank + 1, entry.player_name, entry.score))
        .collect();
    CommandResult::Ok(Some(lines.join("\n")))
}

/// Show the local player's items.
fn cmd_items(snapshot: &SessionSnapshot) -> CommandResult {
    let items = snapshot.session.local_items();
    if items.is_empty() {
        return CommandResult::Ok(Some("You have no items.".to_string()));
    }

    let names: Vec<&str> = items.iter().map(|i| i.as_str()).collect();
    CommandResult::Ok(Some(format!("Your items: {}", names.join(", "))))
}

/// Show help.
fn cmd_help() -> CommandResult {
    let help = r#"Available commands:
  /answer <choice>         - Answer by choice text or number
  /item <kind> [player]    - Use cannon or torpedo on a player, or shield
  /next                    - Advance to the next question (host only)
  /players                 - List players
  /scores                  - Show the leaderboard
  /items                   - Show your items
  /quit                    - Leave the session
  /help                    - Show this help
Anything else is sent as chat.

Items:"#;
    let items: Vec<String> = ItemKind::ALL
        .iter()
        .map(|item| format!("  {:<24} - {}", item.as_str().to_lowercase(), item.description()))
        .collect();
    CommandResult::Ok(Some(format!("{}\n{}", help, items.join("\n"))))
}
