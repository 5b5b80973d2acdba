use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use ludo_engine::engine::bot_client::{run_bot_client, BotOptions, BotReport};
use ludo_engine::engine::bot_strategy::{strategy_from_name, STRATEGY_NAMES};
use ludo_engine::engine::config::{load_config, load_default_config};
use ludo_engine::engine::lobby::generate_room_id;
use ludo_engine::engine::models::{JoinRequest, RoomId, RoomLink};
use ludo_engine::engine::session::ClientSession;
use ludo_engine::engine::store::{MemoryStore, RoomStore};
use ludo_engine::games::ludo::types::TOKENS_PER_PLAYER;
use ludo_engine::games::ludo::{validate_player_count, Color, RoomSummary};

#[derive(Parser)]
#[command(name = "ludo-engine", about = "Play one Ludo room to completion with a bot client per seat")]
struct Cli {
    /// Number of seats (2-4)
    #[arg(short, long, default_value = "4", env = "LUDO_PLAYERS")]
    players: u8,

    /// Room id (default: generated)
    #[arg(long, env = "LUDO_ROOM")]
    room: Option<String>,

    /// Join through a shared link instead, e.g. "?player=blue&room=room-abc&numPlayers=3"
    #[arg(long, conflicts_with_all = ["room", "players"])]
    link: Option<String>,

    /// Path to ludo.toml (default: auto-discover)
    #[arg(long, env = "LUDO_CONFIG")]
    config: Option<PathBuf>,

    /// Comma-separated strategies, assigned to seats round-robin
    #[arg(long, default_values = ["greedy", "random"], value_delimiter = ',')]
    strategies: Vec<String>,

    /// Simulated store write latency (overrides config)
    #[arg(long, env = "LUDO_WRITE_LATENCY_MS")]
    latency_ms: Option<u64>,

    /// Auto-skip display delay (overrides config)
    #[arg(long, env = "LUDO_SKIP_DELAY_MS")]
    skip_delay_ms: Option<u64>,

    /// Disable automatic play of a single legal move
    #[arg(long)]
    no_auto_move: bool,

    /// Bot think time before each action
    #[arg(long, default_value = "0")]
    think_ms: u64,

    /// Base seed for dice and strategies
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TableResult {
    room_id: RoomId,
    version: Option<u64>,
    summary: Option<RoomSummary>,
    links: Vec<String>,
    bots: Vec<BotReport>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path).map_err(|e| format!("Failed to load config: {}", e))?,
        None => load_default_config(),
    };
    if let Some(ms) = cli.latency_ms {
        config.store.write_latency_ms = ms;
    }
    if let Some(ms) = cli.skip_delay_ms {
        config.session.skip_delay_ms = ms;
    }
    if cli.no_auto_move {
        config.session.auto_move = false;
    }

    for name in &cli.strategies {
        if strategy_from_name(name).is_none() {
            return Err(format!("unknown strategy '{}', expected one of {:?}", name, STRATEGY_NAMES).into());
        }
    }

    let (room_id, num_players, first_color) = resolve_table(&cli)?;

    let store = Arc::new(MemoryStore::new().with_write_latency(config.store.write_latency()));
    tracing::info!(room = %room_id, num_players, "starting table");

    let options = BotOptions {
        think_delay: Duration::from_millis(cli.think_ms),
        ..BotOptions::default()
    };

    // Every seat joins concurrently, so colors are settled by the store.
    let mut handles = Vec::new();
    for seat in 0..num_players as usize {
        let store = Arc::clone(&store);
        let config = config.clone();
        let options = options.clone();
        let strategy_name = cli.strategies[seat % cli.strategies.len()].clone();
        let request = JoinRequest {
            room_id: room_id.clone(),
            requested_color: if seat == 0 { first_color } else { None },
            num_players,
        };
        let seed = cli.seed.wrapping_add(seat as u64);
        handles.push(tokio::spawn(async move {
            let strategy = strategy_from_name(&strategy_name)
                .ok_or_else(|| format!("unknown strategy '{}'", strategy_name))?;
            let session = ClientSession::join(store, request, &config).await?.with_seed(seed);
            let report = run_bot_client(session, strategy.as_ref(), &options, seed).await?;
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(report)
        }));
    }

    let mut bots = Vec::new();
    for handle in handles {
        match handle.await? {
            Ok(report) => bots.push(report),
            Err(e) => tracing::warn!(error = %e, "bot client failed"),
        }
    }

    let snapshot = store.load(&room_id).await?;
    let links: Vec<String> = snapshot
        .as_ref()
        .map(|s| {
            s.room
                .active_colors
                .iter()
                .map(|&color| {
                    RoomLink {
                        color,
                        room_id: room_id.clone(),
                        num_players: s.room.num_players,
                    }
                    .to_string()
                })
                .collect()
        })
        .unwrap_or_default();

    let result = TableResult {
        room_id: room_id.clone(),
        version: snapshot.as_ref().map(|s| s.version),
        summary: snapshot.as_ref().map(|s| s.room.summary()),
        links,
        bots,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_table(&result);
    }
    Ok(())
}

/// Room, seat count and first requested color, from either a link or flags.
/// Fails before anything is spawned when the seat count is out of range.
fn resolve_table(cli: &Cli) -> Result<(RoomId, u8, Option<Color>), Box<dyn std::error::Error>> {
    let (room_id, num_players, first_color) = match &cli.link {
        Some(link) => {
            let link: RoomLink = link.parse()?;
            (link.room_id, link.num_players, Some(link.color))
        }
        None => {
            let room_id = match &cli.room {
                Some(id) => RoomId::parse(id)?,
                None => generate_room_id(&mut rand::thread_rng()),
            };
            (room_id, cli.players, None)
        }
    };
    Ok((room_id, validate_player_count(num_players)?, first_color))
}

fn print_table(result: &TableResult) {
    println!("Room {} (version {:?})", result.room_id, result.version);
    println!("{}", "=".repeat(60));
    if let Some(summary) = &result.summary {
        let winner = summary.winner.map_or("none".to_string(), |c: Color| c.to_string());
        println!("  Winner: {}", winner);
        for (color, finished) in &summary.finished {
            println!("  {:>8}: {}/{} tokens home", color.as_str(), finished, TOKENS_PER_PLAYER);
        }
    }
    for bot in &result.bots {
        println!(
            "  {:>8} [{}]: rolls={} moves={} captures={} skips={} superseded={} retries={}{}",
            bot.color.map_or("?", Color::as_str),
            bot.strategy,
            bot.rolls,
            bot.moves,
            bot.captures,
            bot.skips,
            bot.superseded,
            bot.retries,
            if bot.stalled { " [stalled]" } else { "" },
        );
    }
    for link in &result.links {
        println!("  link: {}", link);
    }
}
