//! Plain-text rendering of session events for the console.

use crate::client::SessionEvent;
use crate::models::{QuestionView, ScoreEntry};

/// One or more console lines for an event. Chatty events render as `None`.
pub fn describe(event: &SessionEvent) -> Option<String> {
    let text = match event {
        SessionEvent::Connected => "Connected. Waiting for the host to start.".to_string(),
        SessionEvent::Closed { code } => format!("Connection closed ({code})."),
        SessionEvent::SessionEnded { reason } => match reason {
            Some(reason) => format!("Session ended: {reason}"),
            None => "Session ended.".to_string(),
        },
        SessionEvent::ServerNotice { message } if !message.is_empty() => format!("* {message}"),
        SessionEvent::PlayerJoined { player } => format!("{} joined.", player.name),
        SessionEvent::GameStarted { .. } => "The game has started!".to_string(),
        SessionEvent::QuestionChanged { question } => question_block(question),
        SessionEvent::RoundTick { remaining } if matches!(*remaining, 10 | 5 | 3 | 2 | 1) => {
            format!("{remaining}s left")
        }
        SessionEvent::RoundExpired { .. } => "Time's up!".to_string(),
        SessionEvent::Chat { username, message } => format!("<{username}> {message}"),
        SessionEvent::Notification(item) => format!("!! {}", item.message),
        SessionEvent::GameEnded { scores } => {
            format!("Game over! Final scores:\n{}", score_table(scores))
        }
        _ => return None,
    };
    Some(text)
}

fn question_block(question: &QuestionView) -> String {
    let mut lines = vec![format!("Question {}: {}", question.number(), question.prompt)];
    lines.extend(
        question
            .choices
            .iter()
            .enumerate()
            .map(|(i, choice)| format!("  {}) {}", i + 1, choice)),
    );
    lines.join("\n")
}

fn score_table(scores: &[ScoreEntry]) -> String {
    let mut ranked = scores.to_vec();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
        .iter()
        .enumerate()
        .map(|(rank, entry)| format!("{:>2}. {:<16} {:>6}", rank + 1, entry.player_name, entry.score))
        .collect::<Vec<_>>()
        .join("\n")
}
