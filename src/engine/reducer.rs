//! Pure reducer: (MatchState, Event) -> (MatchState, Vec<Effect>)
//!
//! Every command handler and every tick runs through here, one event at a
//! time, against the single shared state. The only nondeterminism is the
//! injected RNG, so a seeded run replays exactly.

use rand::Rng;
use serde::Deserialize;
use serde_json::Value;

use crate::catalog::{AvatarId, PowerUpKind, StrategyKind};
use crate::engine::phase::{self, TickOutcome};
use crate::engine::state::{Config, MatchState};
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::{ledger, valuation};

/// External command, as received from a client connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Join { conn_id: String, name: String },
    Leave { conn_id: String },
    SelectAvatar { conn_id: String, avatar: AvatarId },
    SelectStrategy { conn_id: String, strategy: StrategyKind },
    Buy { conn_id: String, asset_id: String, quantity: f64 },
    Sell { conn_id: String, asset_id: String, quantity: f64 },
    UsePowerUp { conn_id: String, power_up: PowerUpKind },
    Reset,
}

#[derive(Debug, Clone)]
pub enum Event {
    Cmd(Command),
    Tick,
}

/// Side effects the reducer asks the driver to perform. The reducer never
/// touches I/O itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Publish a fresh state snapshot to all connections.
    Broadcast,
    /// The match just finished; compose and publish results.
    Finished,
}

/// Result of processing an event
#[derive(Debug)]
pub struct ReducerOutput {
    pub effects: Vec<Effect>,
    pub state_hash: u64,
}

/// Pure reducer function
pub fn reduce<R: Rng>(
    state: &mut MatchState,
    event: Event,
    cfg: &Config,
    rng: &mut R,
) -> ReducerOutput {
    let mut effects = Vec::new();

    match event {
        Event::Cmd(cmd) => handle_command(state, cmd, cfg, rng, &mut effects),
        Event::Tick => match phase::tick(state, cfg, rng) {
            TickOutcome::Idle => {}
            TickOutcome::Advanced => effects.push(Effect::Broadcast),
            TickOutcome::MatchEnded => {
                log(
                    Level::Info,
                    Domain::Phase,
                    "match_finished",
                    obj(&[("rounds", v_num(state.current_round as f64))]),
                );
                effects.push(Effect::Broadcast);
                effects.push(Effect::Finished);
            }
        },
    }

    ReducerOutput { effects, state_hash: state.state_hash() }
}

fn handle_command<R: Rng>(
    state: &mut MatchState,
    cmd: Command,
    cfg: &Config,
    rng: &mut R,
    effects: &mut Vec<Effect>,
) {
    match cmd {
        Command::Join { conn_id, name } => {
            phase::on_join(state, cfg, &conn_id, &name);
            effects.push(Effect::Broadcast);
        }
        Command::Leave { conn_id } => {
            phase::on_leave(state, cfg, &conn_id);
            effects.push(Effect::Broadcast);
        }
        Command::SelectAvatar { conn_id, avatar } => {
            if phase::on_select_avatar(state, cfg, &conn_id, avatar, rng) {
                effects.push(Effect::Broadcast);
            }
        }
        Command::SelectStrategy { conn_id, strategy } => {
            if phase::on_select_strategy(state, cfg, &conn_id, strategy, rng) {
                effects.push(Effect::Broadcast);
            }
        }
        Command::Buy { conn_id, asset_id, quantity } => {
            if ledger::buy(state, &conn_id, &asset_id, quantity) {
                valuation::recompute_all(state);
                log_trade(state, &conn_id, "buy", &asset_id, quantity);
                effects.push(Effect::Broadcast);
            } else {
                log(
                    Level::Debug,
                    Domain::Trade,
                    "buy_rejected",
                    obj(&[
                        ("conn_id", v_str(&conn_id)),
                        ("asset", v_str(&asset_id)),
                        ("quantity", v_num(quantity)),
                    ]),
                );
            }
        }
        Command::Sell { conn_id, asset_id, quantity } => {
            if ledger::sell(state, &conn_id, &asset_id, quantity) {
                valuation::recompute_all(state);
                log_trade(state, &conn_id, "sell", &asset_id, quantity);
                effects.push(Effect::Broadcast);
            } else {
                log(
                    Level::Debug,
                    Domain::Trade,
                    "sell_rejected",
                    obj(&[
                        ("conn_id", v_str(&conn_id)),
                        ("asset", v_str(&asset_id)),
                        ("quantity", v_num(quantity)),
                    ]),
                );
            }
        }
        Command::UsePowerUp { conn_id, power_up } => {
            if valuation::use_power_up(state, &conn_id, power_up, cfg) {
                log(
                    Level::Info,
                    Domain::Risk,
                    "power_up_used",
                    obj(&[
                        ("conn_id", v_str(&conn_id)),
                        ("power_up", v_str(power_up.name())),
                    ]),
                );
                effects.push(Effect::Broadcast);
            }
        }
        Command::Reset => {
            phase::on_reset(state, cfg);
            effects.push(Effect::Broadcast);
        }
    }
}

fn log_trade(state: &MatchState, conn_id: &str, side: &str, asset_id: &str, quantity: f64) {
    let entry = state
        .players
        .iter()
        .find(|p| p.id == conn_id)
        .and_then(|p| p.transaction_log.last());
    let price = entry.map(|e| e.price).unwrap_or(0.0);
    log(
        Level::Info,
        Domain::Trade,
        "trade_accepted",
        obj(&[
            ("conn_id", v_str(conn_id)),
            ("side", v_str(side)),
            ("asset", v_str(asset_id)),
            ("quantity", v_num(quantity)),
            ("price", v_num(price)),
        ]),
    );
}

impl Command {
    /// Parse one line of client input.
    pub fn from_json_line(line: &str) -> Result<Command, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Snapshot sent to clients after each effectful event.
pub fn snapshot(state: &MatchState) -> Value {
    serde_json::to_value(state).unwrap_or(Value::Null)
}
