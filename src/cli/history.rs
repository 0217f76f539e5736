//! CLI `history` command: show what the model would see for an identity.

use anyhow::Result;
use recollect::config::RecollectConfig;
use recollect::memory::history::Window;
use recollect::memory::types::Turn;
use recollect::store::turns::SqliteTurnLog;
use recollect::store::TurnLog;

pub async fn history(
    config: &RecollectConfig,
    identity: &str,
    limit: Option<usize>,
    all: bool,
) -> Result<()> {
    let log = SqliteTurnLog::new(super::open_shared(config)?);

    let turns = if all {
        log.full_log(identity).await?
    } else {
        let limit = limit.unwrap_or(config.history.limit).max(1);
        let window = Window::from_newest_first(log.recent(identity, limit).await?);
        window.turns().to_vec()
    };

    if turns.is_empty() {
        println!("No turns for {identity}.");
        return Ok(());
    }

    for turn in &turns {
        print_turn(turn);
    }
    println!("\n{} turn(s)", turns.len());
    Ok(())
}

fn print_turn(turn: &Turn) {
    let preview = if turn.text.chars().count() > 120 {
        format!("{}...", turn.text.chars().take(120).collect::<String>())
    } else {
        turn.text.clone()
    };
    let media = turn
        .media_url
        .as_deref()
        .map(|m| format!(" [media: {m}]"))
        .unwrap_or_default();
    println!(
        "  {} {:<15} {}{}",
        turn.timestamp.format("%Y-%m-%d %H:%M:%S"),
        turn.direction.as_str(),
        preview,
        media
    );
}
