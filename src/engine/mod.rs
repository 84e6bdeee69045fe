//! Match engine: one task, one clock, one state.
//!
//! ```text
//!   client commands (mpsc) ──┐
//!                            ├──> reduce(state, event) ──> effects
//!   1 Hz interval ───────────┘            │
//!                                         ├── Broadcast ──> snapshot channel
//!                                         └── Finished ───> analyst + results
//! ```
//!
//! Commands and ticks are serialized through a single `select!` loop, so no
//! two events ever interleave against the shared [`state::MatchState`]. The
//! pre-match countdown and the round clock are the same interval read by
//! the phase machine, which rules out overlapping timers across phase
//! transitions. The one async boundary is the narrative analyst at match
//! end, awaited under a bounded timeout after the FINISHED snapshot has
//! already gone out.

pub mod phase;
pub mod reducer;
pub mod state;

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::analysis::{analyze_with_fallback, Analyst};
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::results::{self, AnalysisReport};
use reducer::{reduce, snapshot, Command, Effect, Event};
use state::{Config, MatchState};

/// Outbound message to every connected client.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Full state snapshot after an effectful command or tick.
    State(serde_json::Value),
    /// Final scoreboard with narrative debriefs.
    Results(serde_json::Value),
}

pub struct Engine {
    cfg: Config,
    state: MatchState,
    rng: StdRng,
    analyst: Box<dyn Analyst>,
    commands: mpsc::Receiver<Command>,
    outbound: broadcast::Sender<Outbound>,
}

pub struct EngineHandle {
    pub commands: mpsc::Sender<Command>,
    pub outbound: broadcast::Sender<Outbound>,
}

impl Engine {
    pub fn new(cfg: Config, analyst: Box<dyn Analyst>) -> (Engine, EngineHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (out_tx, _) = broadcast::channel(256);
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let engine = Engine {
            state: MatchState::with_config(&cfg),
            cfg,
            rng,
            analyst,
            commands: cmd_rx,
            outbound: out_tx.clone(),
        };
        (engine, EngineHandle { commands: cmd_tx, outbound: out_tx })
    }

    /// Drive the match until the command channel closes.
    pub async fn run(mut self) {
        log(
            Level::Info,
            Domain::System,
            "engine_started",
            obj(&[
                ("config_hash", v_str(&self.cfg.config_hash())),
                ("seeded", json!(self.cfg.seed.is_some())),
            ]),
        );

        let mut clock = interval(Duration::from_secs(1));
        // A stalled tick is delivered late, never doubled up.
        clock.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => Event::Cmd(cmd),
                    None => break,
                },
                _ = clock.tick() => Event::Tick,
            };

            let out = reduce(&mut self.state, event, &self.cfg, &mut self.rng);
            for effect in out.effects {
                match effect {
                    Effect::Broadcast => {
                        let _ = self.outbound.send(Outbound::State(snapshot(&self.state)));
                    }
                    Effect::Finished => self.publish_results().await,
                }
            }
        }

        log(Level::Info, Domain::System, "engine_stopped", obj(&[]));
    }

    /// Gather per-player debriefs (remote analyst with heuristic fallback)
    /// and publish the ranked scoreboard. The FINISHED snapshot has already
    /// been broadcast, so a slow analyst delays only the scoreboard, and
    /// only up to the configured timeout per player.
    async fn publish_results(&mut self) {
        let mut reports: HashMap<String, AnalysisReport> = HashMap::new();
        for player in &self.state.players {
            let ctx = results::trading_context(player, &self.state.round_news);
            let report =
                analyze_with_fallback(self.analyst.as_ref(), player, &ctx, &self.cfg).await;
            reports.insert(player.id.clone(), report);
        }

        let ranking = results::compose(&self.state, &self.cfg, &reports);
        log(
            Level::Info,
            Domain::Results,
            "results_published",
            obj(&[
                ("players", v_num(ranking.len() as f64)),
                (
                    "winner",
                    ranking.first().map(|r| v_str(&r.player_name)).unwrap_or(json!(null)),
                ),
            ]),
        );
        let payload = serde_json::to_value(&ranking).unwrap_or(json!([]));
        let _ = self.outbound.send(Outbound::Results(payload));
    }
}
