//! Interactive session command handler.

use super::input::{Line, parse_line, parse_ordering};
use fabula_error::{ErrorDisposition, FabulaError, FabulaErrorKind, FabulaResult};
use fabula_interface::{FabulaDriver, SessionId};
use fabula_story::{Chapter, Persisted, Progress, StoryService};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

type Input = Lines<BufReader<Stdin>>;

const HELP: &str = "\
Type a feature you want the robot to have, and a new chapter is written around it.
  :revise N text   rewrite chapter N around a different feature
  :story           print the story so far
  :progress        show which dimensions are covered
  :help            show this message";

/// Run one session on stdin until it ends, then collect the ranking.
pub async fn run_session<D: FabulaDriver + ?Sized>(
    service: &StoryService<D>,
    id: SessionId,
) -> FabulaResult<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let end_word = service.settings().end_command().clone();

    println!("Session {}", id);
    println!("{}", HELP);
    println!("Type '{}' to finish.\n", end_word);

    while let Some(line) = next_line(&mut input, "> ").await {
        match parse_line(&line, service.settings()) {
            Line::Empty => {}
            Line::End => break,
            Line::Help => println!("{}", HELP),
            Line::Invalid(message) => println!("{}", message),
            Line::Story => println!("\n{}\n", service.get_complete_story(id).await?),
            Line::Progress => print_progress(&service.progress(id).await?),
            Line::Feature(text) => {
                if !submit(service, id, &text, None).await? {
                    break;
                }
            }
            Line::Revise { target, text } => {
                if !submit(service, id, &text, Some(target)).await? {
                    break;
                }
            }
        }
    }

    let summary = service.end_session(id).await?;
    warn_if_volatile(&summary);
    let summary = summary.into_inner();
    println!("\n=== Your story ===\n\n{}\n", summary.complete_story());
    println!(
        "{} prompts, {} chapters, {:.2}% of dimensions covered",
        summary.num_prompts(),
        summary.num_chapters(),
        summary.coverage_percentage()
    );

    collect_ranking(service, id, &mut input).await
}

/// Submit one request. Returns false once the session can take no more.
async fn submit<D: FabulaDriver + ?Sized>(
    service: &StoryService<D>,
    id: SessionId,
    text: &str,
    target: Option<usize>,
) -> FabulaResult<bool> {
    println!("Writing...");
    match service.submit_feature(id, text, target).await {
        Ok(chapter) => {
            warn_if_volatile(&chapter);
            print_chapter(chapter.value());
            print_progress(&service.progress(id).await?);
            Ok(service.phase(id).await? != fabula_story::Phase::SessionEnded)
        }
        Err(e) => after_failure(e),
    }
}

/// Whether the loop continues after a failed request. Model failures leave
/// the session awaiting input even when resubmitting cannot help.
fn after_failure(e: FabulaError) -> FabulaResult<bool> {
    match e.disposition() {
        ErrorDisposition::SessionOver => {
            println!("{}", e);
            Ok(false)
        }
        ErrorDisposition::Retry | ErrorDisposition::FixInput => {
            warn!(error = %e, "Request not completed");
            println!("{}\nNothing was written; try again.", e);
            Ok(true)
        }
        ErrorDisposition::Fault if matches!(e.kind(), FabulaErrorKind::Model(_)) => {
            warn!(error = %e, "Model rejected the request");
            println!("{}\nNothing was written; try a shorter or different feature.", e);
            Ok(true)
        }
        ErrorDisposition::Fault => Err(e),
    }
}

async fn collect_ranking<D: FabulaDriver + ?Sized>(
    service: &StoryService<D>,
    id: SessionId,
    input: &mut Input,
) -> FabulaResult<()> {
    let features = service.features(id).await?;
    if features.is_empty() {
        return Ok(());
    }
    if service.session_state(id).await?.ranking().is_some() {
        println!("This session has already been ranked.");
        return Ok(());
    }

    println!("\nRank your ideas, best first, by number (e.g. 2,1,3). Leave empty to skip.");
    for (n, feature) in features.iter().enumerate() {
        println!("  {}. {}", n + 1, feature);
    }

    while let Some(line) = next_line(input, "ranking> ").await {
        if line.trim().is_empty() {
            info!("Ranking skipped");
            return Ok(());
        }
        let entries = match parse_ordering(&line, &features) {
            Ok(entries) => entries,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };
        match service.submit_rankings(id, entries).await {
            Ok(ranking) => {
                warn_if_volatile(&ranking);
                println!("Thank you. Your ranking:");
                for (n, feature) in ranking.value().ordered_features().iter().enumerate() {
                    println!("  {}. {}", n + 1, feature);
                }
                return Ok(());
            }
            Err(e) if e.disposition() == ErrorDisposition::FixInput => println!("{}", e),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

async fn next_line(input: &mut Input, prompt: &str) -> Option<String> {
    use std::io::Write;
    print!("{}", prompt);
    let _ = std::io::stdout().flush();
    match input.next_line().await {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, "Failed to read input");
            None
        }
    }
}

fn print_chapter(chapter: &Chapter) {
    println!(
        "\n--- Chapter {} ({}) ---\n{}\n",
        chapter.index(),
        chapter.dimension(),
        chapter.story()
    );
}

fn print_progress(progress: &Progress) {
    println!(
        "Covered {}/{} dimensions ({:.2}%): {}",
        progress.covered().len(),
        progress.total(),
        progress.coverage_percentage(),
        progress.covered().join(", ")
    );
}

fn warn_if_volatile<T>(persisted: &Persisted<T>) {
    if let Some(e) = persisted.warning() {
        println!("Warning: not saved ({})", e);
    }
}
