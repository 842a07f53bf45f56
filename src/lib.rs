pub(crate) mod core;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod session;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::core::{config::Settings, telemetry};
use crate::schemas::exam::OptionKey;
use crate::services::exam_api::HttpExamService;
use crate::session::controller::{ExamSessionController, SessionCommand, SessionSnapshot};
use crate::session::state::SessionState;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    let exam_id = parse_exam_id(std::env::args().nth(1))?;
    let service = Arc::new(HttpExamService::from_settings(&settings)?);

    let (controller, mut snapshots, mut notices) = ExamSessionController::new(service, exam_id);
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let driver = tokio::spawn(controller.run(command_rx));

    // Wait for the initial fetch to settle one way or the other.
    while snapshots.borrow().state == SessionState::Loading {
        if snapshots.changed().await.is_err() {
            break;
        }
    }

    let opening = snapshots.borrow().clone();
    if opening.state != SessionState::Active {
        while let Ok(notice) = notices.try_recv() {
            eprintln!("{notice}");
        }
        drop(command_tx);
        let state = driver.await?;
        anyhow::bail!("exam {exam_id} could not be started (final state: {state:?})");
    }

    print_exam(&opening);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Some(notice) => println!("{notice}"),
                None => break,
            },
            changed = snapshots.changed() => match changed {
                Ok(()) => {
                    let snapshot = snapshots.borrow().clone();
                    if snapshot.state == SessionState::Active
                        && matches!(snapshot.remaining_seconds, 60 | 10)
                    {
                        println!("{} seconds remaining", snapshot.remaining_seconds);
                    }
                }
                Err(_) => break,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(text)) => match parse_command(&text) {
                    Some(command) => {
                        if command_tx.send(command).is_err() {
                            break;
                        }
                    }
                    None => println!("enter '<question id> <A-D>' to answer or 'submit' to finish"),
                },
                Ok(None) | Err(_) => stdin_open = false,
            },
        }
    }

    // The controller may have ended while notices were still queued.
    while let Ok(notice) = notices.try_recv() {
        println!("{notice}");
    }

    drop(command_tx);
    let state = driver.await?;
    tracing::info!(exam_id, state = ?state, "Exam session finished");

    Ok(())
}

fn parse_exam_id(arg: Option<String>) -> anyhow::Result<i64> {
    let raw = arg.context("usage: examhall <exam-id>")?;
    raw.parse::<i64>().with_context(|| format!("invalid exam id: {raw}"))
}

fn print_exam(snapshot: &SessionSnapshot) {
    println!("{}", snapshot.title);
    if snapshot.remaining_seconds > 0 {
        println!("Time limit: {} minutes", snapshot.remaining_seconds / 60);
    }
    for question in snapshot.questions.iter() {
        println!("\n[{}] {}", question.id, question.question_text);
        for key in OptionKey::ALL {
            if let Some(text) = question.option_text(key) {
                println!("  {}. {}", key.letter(), text);
            }
        }
    }
    println!("\nAnswer with '<question id> <A-D>', then 'submit'.");
}

fn parse_command(line: &str) -> Option<SessionCommand> {
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case("submit") {
        return Some(SessionCommand::Submit);
    }

    let mut parts = trimmed.split_whitespace();
    let question_id = parts.next()?.parse::<i64>().ok()?;
    let letter = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let mut chars = letter.chars();
    let option = OptionKey::from_letter(chars.next()?)?;
    if chars.next().is_some() {
        return None;
    }

    Some(SessionCommand::SelectOption { question_id, option })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_command_accepts_answers_and_submit() {
        assert_eq!(
            parse_command("301 b"),
            Some(SessionCommand::SelectOption { question_id: 301, option: OptionKey::OptionB })
        );
        assert_eq!(
            parse_command("  302 A "),
            Some(SessionCommand::SelectOption { question_id: 302, option: OptionKey::OptionA })
        );
        assert_eq!(parse_command("submit"), Some(SessionCommand::Submit));
        assert_eq!(parse_command("SUBMIT"), Some(SessionCommand::Submit));
    }

    #[test]
    fn parse_command_rejects_malformed_input() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("301"), None);
        assert_eq!(parse_command("301 E"), None);
        assert_eq!(parse_command("301 AB"), None);
        assert_eq!(parse_command("abc A"), None);
        assert_eq!(parse_command("301 A extra"), None);
    }
}
