use anyhow::Result;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use bvb_engine::analysis::analyst_for;
use bvb_engine::catalog;
use bvb_engine::engine::reducer::Command;
use bvb_engine::engine::state::Config;
use bvb_engine::engine::{Engine, Outbound};
use bvb_engine::logging::{log, obj, v_num, v_str, Domain, Level};

/// Line-delimited JSON transport: commands in on stdin, snapshots and
/// results out on stdout. A websocket gateway sits in front of this in
/// deployment; the engine itself only speaks lines.
#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    catalog::validate()?;

    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("config_hash", v_str(&cfg.config_hash())),
            ("assets", v_num(catalog::ASSETS.len() as f64)),
            ("analyst", v_str(if cfg.analyst_url.is_some() { "remote" } else { "heuristic" })),
        ]),
    );

    let analyst = analyst_for(&cfg);
    let (engine, handle) = Engine::new(cfg, analyst);
    let mut outbound = handle.outbound.subscribe();
    let engine_task = tokio::spawn(engine.run());

    let writer_task = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        loop {
            let msg = match outbound.recv().await {
                Ok(msg) => msg,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    log(
                        Level::Warn,
                        Domain::System,
                        "outbound_lagged",
                        obj(&[("skipped", v_num(skipped as f64))]),
                    );
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            };
            let line = match msg {
                Outbound::State(data) => json!({"event": "game_state", "data": data}),
                Outbound::Results(data) => json!({"event": "results", "data": data}),
            };
            if stdout
                .write_all(format!("{}\n", line).as_bytes())
                .await
                .and(stdout.flush().await)
                .is_err()
            {
                break;
            }
        }
    });

    let commands = handle.commands.clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match Command::from_json_line(line) {
            Ok(cmd) => {
                if commands.send(cmd).await.is_err() {
                    break;
                }
            }
            Err(err) => log(
                Level::Warn,
                Domain::System,
                "bad_command",
                obj(&[("error", v_str(&err.to_string()))]),
            ),
        }
    }

    // Stdin closed: dropping the senders stops the engine loop.
    drop(commands);
    drop(handle);
    let _ = engine_task.await;
    writer_task.abort();
    Ok(())
}
