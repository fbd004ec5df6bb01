//! Interactive quiz on stdin/stdout.
//!
//! Answers come in line by line while asset notifications arrive on the
//! broadcast channel; both are awaited together so an image produced in the
//! background shows up under the question it belongs to.

use std::io::{self, Write};

use services::AppServices;
use services::SessionMode;
use services::assets::AssetReady;
use services::sessions::{AnswerResult, NextAction, NextStep, Prompt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

const QUIT: &str = ":q";
const IMAGE: &str = ":img";
const SAY: &str = ":say";

pub async fn run(app: &AppServices, mode: SessionMode) -> Result<(), Box<dyn std::error::Error>> {
    let session_loop = app.session_loop();

    if let Some(checkpoint) = session_loop.resumable().await? {
        println!(
            "Last session on {} was left at {}; starting over.",
            checkpoint.deck_name,
            checkpoint.saved_at.to_rfc3339()
        );
        session_loop.discard_checkpoint().await?;
    }

    let mut session = session_loop.start_session(mode).await?;
    let mut events = app.notifier().subscribe();
    let mut listening = true;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "Deck {} ({} mode). {IMAGE} draws, {SAY} speaks, {QUIT} saves and quits.",
        session.deck_name(),
        mode.as_str()
    );

    loop {
        let prompt = match session_loop.next_prompt(&mut session).await {
            NextStep::Prompt(prompt) => prompt,
            NextStep::Finished(_) => break,
        };
        show_prompt(&mut io::stdout(), &prompt, session.hint())?;

        let line = loop {
            tokio::select! {
                line = lines.next_line() => break line?,
                event = events.recv(), if listening => match event {
                    Ok(ready) if ready.is_for(&prompt.question_text) => {
                        show_ready(&mut io::stdout(), &ready)?;
                    }
                    Ok(ready) => {
                        tracing::debug!(key = %ready.key, "dropping asset for a past question");
                    }
                    Err(RecvError::Lagged(n)) => {
                        tracing::debug!(skipped = n, "asset notifications lagged");
                    }
                    Err(RecvError::Closed) => listening = false,
                },
            }
        };

        let answer = match line.as_deref().map(str::trim) {
            None | Some(QUIT) => {
                let checkpoint = session_loop.save_and_quit(session).await?;
                println!("Saved. Resume deck {} any time.", checkpoint.deck_name);
                return Ok(());
            }
            Some(IMAGE) => {
                if session_loop.request_image(&session).is_some() {
                    println!("  drawing {}", prompt.question_text);
                }
                continue;
            }
            Some(SAY) => {
                match session_loop.replay_audio(&session).await? {
                    Some(audio) => println!("  audio: {}", audio.describe()),
                    None => println!("  no pronunciation available"),
                }
                continue;
            }
            Some(answer) => answer.to_owned(),
        };

        if let Some(result) = session_loop.answer(&mut session, &answer).await? {
            show_result(&result);
        }
    }

    let summary = session_loop.finish(&session).await?;
    println!(
        "Score {}/{} with {} missed words.",
        summary.score, summary.total, summary.wrong_count
    );
    if summary.wrong_count > 0 {
        println!("Run `voca quiz --mode wrong` to drill them again.");
    }
    Ok(())
}

fn show_prompt(
    out: &mut impl Write,
    prompt: &Prompt,
    hint: Option<voca_core::hint::Hint>,
) -> io::Result<()> {
    let marker = if prompt.from_retry { " (again)" } else { "" };
    writeln!(
        out,
        "[{}/{}] {}{marker}",
        prompt.progress.done + 1,
        prompt.progress.total,
        prompt.question_text
    )?;
    if let Some(hint) = hint {
        writeln!(out, "  hint: {hint}")?;
    }
    write!(out, "> ")?;
    out.flush()
}

fn show_result(result: &AnswerResult) {
    let outcome = &result.outcome;
    if outcome.is_correct {
        println!("  correct");
    } else {
        println!("  wrong: {} = {}", outcome.word, outcome.correct_answer);
        if let Some(count) = result.wrong_count {
            println!("  missed {count} times so far");
        }
    }
    if let Some(image) = &result.image {
        println!("  image: {}", image.describe());
    } else if result.image_pending {
        println!("  an image is on its way");
    }
    if outcome.next_action == NextAction::ShowSummary {
        println!();
    }
}

fn show_ready(out: &mut impl Write, ready: &AssetReady) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "  {} ready: {}", ready.kind.as_str(), ready.payload.describe())?;
    write!(out, "> ")?;
    out.flush()
}
