use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use tracing::warn;

use review_core::model::{Card, CardId, ReviewGrade, SessionKey};
use services::{CardFace, CompletionStatus, ReviewSession, ReviewSessionService};
use storage::repository::Storage;

/// One line of learner input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Reveal,
    Grade(ReviewGrade),
    Previous,
    Next,
    Resume,
    Skip,
    Quit,
    Unknown,
}

impl Input {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Self::Reveal,
            "p" => Self::Previous,
            "n" => Self::Next,
            "r" => Self::Resume,
            "s" => Self::Skip,
            "q" => Self::Quit,
            other => other
                .parse::<u8>()
                .ok()
                .and_then(|score| ReviewGrade::from_score(score).ok())
                .map_or(Self::Unknown, Self::Grade),
        }
    }
}

pub fn describe_status(status: CompletionStatus) -> String {
    match status {
        CompletionStatus::NothingDue => "nothing due".into(),
        CompletionStatus::InProgress { reviewed, total } => format!("{reviewed}/{total} reviewed"),
        CompletionStatus::NeedsAnotherPass {
            ungraded,
            again,
            ..
        } => format!("{ungraded} unfinished, {again} to retry; r goes again, s skips the pass"),
        CompletionStatus::Complete => "all done for today".into(),
    }
}

/// Drive a day's session from stdin until the learner quits or finishes.
pub async fn run(
    service: &ReviewSessionService,
    storage: &Storage,
    key: SessionKey,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(mut session) = service.start_session(key).await? else {
        println!("{key}: nothing due");
        return Ok(());
    };

    let cards: HashMap<CardId, Card> = storage
        .cards
        .list_cards(key.language)
        .await?
        .into_iter()
        .map(|card| (card.id().clone(), card))
        .collect();

    let mut pending: Vec<JoinHandle<()>> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        render(&session, &cards, &mut stdout).await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match Input::parse(&line) {
            Input::Reveal => session.reveal(),
            Input::Grade(grade) => match session.grade(grade) {
                Ok(handle) => {
                    pending.push(handle);
                    pending.retain(|h| !h.is_finished());
                }
                Err(err) => println!("{err}"),
            },
            Input::Previous => session.previous(),
            Input::Next => session.next(),
            Input::Resume => {
                if !session.resume() {
                    println!("nothing left to resume");
                }
            }
            Input::Skip => {
                if !session.skip_pass() {
                    println!("nothing left to skip");
                }
            }
            Input::Quit => break,
            Input::Unknown => {
                println!("Enter reveals, 1-4 grades, p/n move, r resumes, s skips, q quits");
            }
        }
        if session.status() == CompletionStatus::Complete {
            break;
        }
    }

    for handle in pending {
        if let Err(err) = handle.await {
            warn!(error = %err, "review write task failed");
        }
    }
    println!("{}", describe_status(session.status()));
    Ok(())
}

async fn render(
    session: &ReviewSession,
    cards: &HashMap<CardId, Card>,
    out: &mut tokio::io::Stdout,
) -> std::io::Result<()> {
    let snapshot = session.store().snapshot();
    let text = match session.current_card() {
        None => format!("-- {}\n", describe_status(session.status())),
        Some(id) => {
            let card = cards.get(id);
            let prompt = card.map_or(id.as_str(), Card::prompt);
            let header = format!("[{}/{}] {prompt}", snapshot.cursor + 1, snapshot.total);
            match (session.face(), card) {
                (CardFace::Revealed, Some(card)) => {
                    format!("{header}\n    {}\n1 again  2 hard  3 good  4 easy > ", card.answer())
                }
                _ => format!("{header}\n(Enter to reveal) > "),
            }
        }
    };
    out.write_all(text.as_bytes()).await?;
    out.flush().await
}
