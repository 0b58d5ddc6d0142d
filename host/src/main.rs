//! Headless duel: two peers over an in-memory link, each driven by a bot.
//!
//! Runs the full handshake and steady-state protocol without a browser and
//! prints a JSON summary of how far the two views agree.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;

use dropduel_core::*;

type Peer = Game<ArenaWorld, LoopbackSession>;

const HOST_ID: &str = "host";
const CLIENT_ID: &str = "client";

#[derive(Parser, Debug)]
#[command(name = "dropduel-host", about = "Play a headless two-peer match and report the outcome")]
struct Cli {
    /// Frames to simulate
    #[arg(long, default_value_t = 3600)]
    frames: u32,

    /// Session seed for the host; the client derives its own
    #[arg(long)]
    seed: Option<u32>,

    /// Probability that a message is dropped
    #[arg(long, default_value_t = 0.0)]
    loss: f64,

    /// Probability that a message is delivered twice
    #[arg(long, default_value_t = 0.0)]
    duplicate: f64,

    /// JSON config file (camelCase fields, all optional)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Milliseconds per frame
    #[arg(long, default_value_t = 16)]
    step_ms: u64,

    /// Start a new round this many times after a game ends
    #[arg(long, default_value_t = 0)]
    rematches: u32,

    /// Write the summary here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<GameConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            GameConfig::from_json(&json).with_context(|| format!("parsing {}", path.display()))?
        }
        None => GameConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

// ============================================================================
// Bot
// ============================================================================

/// Chases the nearest collectible of its own color and double-jumps toward
/// ones that are out of reach.
#[derive(Default)]
struct Bot {
    jump_held: bool,
}

impl Bot {
    fn input(&mut self, game: &Peer) -> PlayerInput {
        let state = game.state();
        let Some(me) = game.local_position() else {
            return NULL_INPUT;
        };
        let target = state
            .collectibles
            .iter()
            .filter(|c| c.spec.color == state.local.color)
            .filter_map(|c| game.physics().body_state(c.body))
            .map(|s| s.position)
            .min_by(|a, b| (a.x - me.x).abs().total_cmp(&(b.x - me.x).abs()));

        let Some(target) = target else {
            self.jump_held = false;
            return NULL_INPUT;
        };

        let mut buttons = 0;
        if target.x < me.x - 4.0 {
            buttons |= button::LEFT;
        } else if target.x > me.x + 4.0 {
            buttons |= button::RIGHT;
        }
        // Edge-triggered: release every other frame so repeated jumps register
        let wants_jump = target.y < me.y - 40.0 && (target.x - me.x).abs() < 60.0;
        if wants_jump && !self.jump_held {
            buttons |= button::JUMP;
        }
        self.jump_held = wants_jump && !self.jump_held;
        PlayerInput::new(buttons)
    }
}

// ============================================================================
// Summary
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PeerSummary {
    phase: &'static str,
    role: Option<Role>,
    color: Color,
    score: u32,
    opponent_score: u32,
    winner: Option<Side>,
    platforms: Vec<PlatformSpec>,
    collectibles: usize,
}

impl PeerSummary {
    fn of(game: &Peer) -> Self {
        let s = game.state();
        PeerSummary {
            phase: game.phase().name(),
            role: s.role,
            color: s.local.color,
            score: s.local.score,
            opponent_score: s.remote.score,
            winner: s.winner,
            platforms: s.platforms.iter().map(|p| p.spec).collect(),
            collectibles: s.collectibles.len(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    frames: u32,
    rounds: u32,
    host: PeerSummary,
    client: PeerSummary,
    platforms_agree: bool,
    scores_agree: bool,
    link: LinkReport,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkReport {
    sent: u64,
    dropped: u64,
    duplicated: u64,
}

// ============================================================================
// Match
// ============================================================================

fn run(cli: &Cli, config: GameConfig) -> Result<Summary> {
    let conditions = LinkConditions {
        loss: cli.loss,
        duplicate: cli.duplicate,
        seed: config.seed,
    };
    let (h, c) = LoopbackSession::pair_with(HOST_ID, CLIENT_ID, LinkConditions::default());
    let world = || ArenaWorld::new(config.arena_width, config.arena_height);
    let client_config = GameConfig { seed: config.seed ^ 0x9e37_79b9, ..config.clone() };
    let mut host: Peer = Game::new(config.clone(), world(), h);
    let mut client: Peer = Game::new(client_config, world(), c);

    let mut now: Millis = 1_700_000_000_000;
    host.pump(now);
    client.pump(now);
    client.connect(HOST_ID).context("client could not reach host")?;
    // Faults only after the link is up so the session events themselves are reliable
    client.session_mut().set_conditions(conditions);

    let (mut host_bot, mut client_bot) = (Bot::default(), Bot::default());
    let mut rounds = 1;
    let mut frames = 0;
    while frames < cli.frames {
        now += cli.step_ms;
        frames += 1;
        host.pump(now);
        client.pump(now);

        let hi = host_bot.input(&host);
        let ci = client_bot.input(&client);
        host.tick(hi, now);
        client.tick(ci, now);
        for event in host.drain_events().into_iter().chain(client.drain_events()) {
            log::debug!("{:?}", event);
        }

        let over = host.state().game_over && client.state().game_over;
        if over && rounds <= cli.rematches {
            if !host.state().rematch_requested {
                host.request_rematch();
            } else if client.state().rematch_offered && client.accept_rematch(now) {
                rounds += 1;
                log::info!("round {} starting at frame {}", rounds, frames);
            }
        } else if over {
            break;
        }
    }

    // Let in-flight messages land
    for _ in 0..4 {
        host.pump(now);
        client.pump(now);
    }

    for (name, peer) in [("host", &host), ("client", &client)] {
        if peer.phase() != SyncPhase::Synchronized {
            log::warn!("{} ended in phase {}", name, peer.phase().name());
        }
    }

    let stats = host.session().stats();
    let host_summary = PeerSummary::of(&host);
    let client_summary = PeerSummary::of(&client);
    Ok(Summary {
        frames,
        rounds,
        platforms_agree: host_summary.platforms == client_summary.platforms,
        scores_agree: host_summary.score == client_summary.opponent_score
            && client_summary.score == host_summary.opponent_score,
        host: host_summary,
        client: client_summary,
        link: LinkReport {
            sent: stats.sent,
            dropped: stats.dropped,
            duplicated: stats.duplicated,
        },
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if !(0.0..=1.0).contains(&cli.loss) || !(0.0..=1.0).contains(&cli.duplicate) {
        bail!("--loss and --duplicate must be within [0, 1]");
    }
    let config = load_config(&cli)?;
    log::info!(
        "simulating {} frames, seed={}, loss={}, duplicate={}",
        cli.frames,
        config.seed,
        cli.loss,
        cli.duplicate
    );

    let summary = run(&cli, config)?;
    log::info!(
        "host {} : {} client after {} frames",
        summary.host.score,
        summary.client.score,
        summary.frames
    );

    let json = serde_json::to_string_pretty(&summary)?;
    match &cli.out {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            log::info!("summary written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
