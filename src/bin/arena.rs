//! Arena CLI: run bot-vs-bot experiments on the pure rules engine.
//!
//! Usage:
//!   cargo run --release --bin arena -- --games 1000 --strategies greedy,random
//!   cargo run --release --bin arena -- --games 200 --strategies greedy,greedy,random,random --fixed-seats

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ludo_engine::engine::arena::{run_arena, Entrant};
use ludo_engine::engine::bot_strategy::{strategy_from_name, STRATEGY_NAMES};

#[derive(Parser)]
#[command(name = "arena", about = "Run bot-vs-bot arena experiments for Ludo")]
struct Cli {
    /// Number of games to play
    #[arg(long, default_value = "100")]
    games: usize,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Keep every strategy on the same color for all games
    #[arg(long)]
    fixed_seats: bool,

    /// One strategy per seat, 2 to 4 of them
    #[arg(long, default_values = ["greedy", "random"], value_delimiter = ',')]
    strategies: Vec<String>,

    /// Worker threads (default: one per core)
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new().num_threads(threads).build_global()?;
    }

    let mut entrants = Vec::new();
    for (seat, name) in cli.strategies.iter().enumerate() {
        let strategy = strategy_from_name(name).ok_or_else(|| {
            format!("unknown strategy '{}', expected one of {:?}", name, STRATEGY_NAMES)
        })?;
        entrants.push(Entrant {
            name: format!("p{}:{}", seat + 1, strategy.name()),
            strategy,
        });
    }

    eprintln!(
        "Arena: {} games, seed={}, rotate_seats={}",
        cli.games, cli.seed, !cli.fixed_seats
    );
    for entrant in &entrants {
        eprintln!("  {}", entrant.name);
    }
    eprintln!();

    let total = cli.games;
    let progress_cb = move |done: usize, _total: usize| {
        if done % 10 == 0 || done == total {
            eprint!("\r  [{}/{}] games completed", done, total);
        }
    };

    let result = run_arena(&entrants, cli.games, cli.seed, !cli.fixed_seats, Some(&progress_cb))?;

    eprintln!("\r                                    "); // clear progress line
    println!("{}", result.summary());
    Ok(())
}
