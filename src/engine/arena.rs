//! Bot-vs-bot arena runner.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::engine::bot_strategy::BotStrategy;
use crate::engine::simulator::{play_one_game, GameRecord};
use crate::games::ludo::{validate_player_count, Color, Rejection};

/// A named participant. Names must be unique within one arena run.
pub struct Entrant {
    pub name: String,
    pub strategy: Box<dyn BotStrategy>,
}

/// Aggregated results from an arena run.
#[derive(Debug, Default)]
pub struct ArenaResult {
    pub num_games: usize,
    pub wins: BTreeMap<String, usize>,
    /// Games that hit the roll cap without a winner.
    pub abandoned: usize,
    pub rolls_per_game: Vec<usize>,
    pub captures_per_game: Vec<usize>,
    pub game_durations_ms: Vec<f64>,
}

impl ArenaResult {
    pub fn win_rate(&self, name: &str) -> f64 {
        *self.wins.get(name).unwrap_or(&0) as f64 / self.num_games.max(1) as f64
    }

    pub fn avg_rolls(&self) -> f64 {
        mean(&self.rolls_per_game)
    }

    pub fn avg_captures(&self) -> f64 {
        mean(&self.captures_per_game)
    }

    /// Wilson score interval.
    pub fn confidence_interval_95(&self, name: &str) -> (f64, f64) {
        let n = self.num_games;
        if n == 0 {
            return (0.0, 0.0);
        }
        let p = self.win_rate(name);
        let z = 1.96_f64;
        let denom = 1.0 + z * z / n as f64;
        let center = (p + z * z / (2.0 * n as f64)) / denom;
        let margin = z * ((p * (1.0 - p) + z * z / (4.0 * n as f64)) / n as f64).sqrt() / denom;
        ((center - margin).max(0.0), (center + margin).min(1.0))
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Arena Results ({} games)", self.num_games)];
        lines.push("=".repeat(60));
        for (name, wins) in &self.wins {
            let (ci_lo, ci_hi) = self.confidence_interval_95(name);
            lines.push(format!(
                "  {:>12}: {:3} wins ({:5.1}%)  [95% CI: {:.1}%-{:.1}%]",
                name,
                wins,
                self.win_rate(name) * 100.0,
                ci_lo * 100.0,
                ci_hi * 100.0,
            ));
        }
        lines.push(format!("  {:>12}: {}", "Abandoned", self.abandoned));
        lines.push(format!(
            "  Avg rolls: {:.1}  |  Avg captures: {:.1}",
            self.avg_rolls(),
            self.avg_captures()
        ));
        if !self.game_durations_ms.is_empty() {
            let total_ms = self.game_durations_ms.iter().sum::<f64>();
            lines.push(format!(
                "  Avg game: {:.2}ms  |  Total: {:.1}s",
                total_ms / self.game_durations_ms.len() as f64,
                total_ms / 1000.0
            ));
        }
        lines.join("\n")
    }
}

fn mean(values: &[usize]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<usize>() as f64 / values.len() as f64
}

/// Entrant index seated at each color for game `game_idx`.
fn seating(num_entrants: usize, game_idx: usize, rotate_seats: bool) -> Vec<usize> {
    let offset = if rotate_seats { game_idx % num_entrants } else { 0 };
    (0..num_entrants).map(|seat| (seat + offset) % num_entrants).collect()
}

/// Run `num_games` in parallel between the entrants (one seat each) and
/// return aggregated stats. Game `i` uses seed `base_seed + i`.
pub fn run_arena(
    entrants: &[Entrant],
    num_games: usize,
    base_seed: u64,
    rotate_seats: bool,
    progress_callback: Option<&(dyn Fn(usize, usize) + Sync)>,
) -> Result<ArenaResult, Rejection> {
    validate_player_count(entrants.len().min(u8::MAX as usize) as u8)?;
    let completed = AtomicUsize::new(0);

    let games: Vec<(Vec<usize>, GameRecord, f64)> = (0..num_games)
        .into_par_iter()
        .map(|game_idx| -> Result<(Vec<usize>, GameRecord, f64), Rejection> {
            let seats = seating(entrants.len(), game_idx, rotate_seats);
            let strategies: Vec<&dyn BotStrategy> =
                seats.iter().map(|&e| entrants[e].strategy.as_ref()).collect();

            let t0 = Instant::now();
            let record = play_one_game(&strategies, base_seed + game_idx as u64)?;
            let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;

            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(cb) = progress_callback {
                cb(done, num_games);
            }
            Ok((seats, record, elapsed_ms))
        })
        .collect::<Result<_, _>>()?;

    let mut result = ArenaResult {
        num_games,
        wins: entrants.iter().map(|e| (e.name.clone(), 0)).collect(),
        ..ArenaResult::default()
    };

    for (seats, record, elapsed_ms) in games {
        result.game_durations_ms.push(elapsed_ms);
        result.rolls_per_game.push(record.rolls);
        result.captures_per_game.push(record.captures);

        let winner_seat = record
            .winner
            .and_then(|w| Color::ALL.iter().position(|&c| c == w));
        match winner_seat.and_then(|seat| seats.get(seat)) {
            Some(&entrant) => {
                if let Some(wins) = result.wins.get_mut(&entrants[entrant].name) {
                    *wins += 1;
                }
            }
            None => result.abandoned += 1,
        }
    }

    tracing::debug!(games = num_games, abandoned = result.abandoned, "arena finished");
    Ok(result)
}
