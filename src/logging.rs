//! Structured JSON logging for the match engine.
//!
//! One JSON object per line, filtered by `LOG_LEVEL` and `LOG_DOMAINS`,
//! mirrored into a per-run `events.jsonl` under `LOG_DIR` so a finished
//! match can be inspected after the fact.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

/// Log domains for filtering (comma-separated `LOG_DOMAINS`, or "all").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Phase,   // Pre-match sub-phases, rounds, finish
    Market,  // News draws, sentiment, price updates
    Trade,   // Buy/sell outcomes
    Risk,    // Risk scores, power-ups
    Results, // Ranking, analysis
    System,  // Startup, reset, broadcast plumbing
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Phase => "phase",
            Domain::Market => "market",
            Domain::Trade => "trade",
            Domain::Risk => "risk",
            Domain::Results => "results",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Mutex<BufWriter<File>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("m-{}-{}", ts_epoch_ms(), process::id()));
        let base = std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".to_string());
        let mut run_dir = PathBuf::from(base);
        run_dir.push(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
        }
        let events = File::create(run_dir.join("events.jsonl")).unwrap_or_else(|err| {
            eprintln!("[log] failed to create events log: {}", err);
            File::create("/tmp/bvb-engine-events.jsonl").expect("events fallback")
        });
        RunContext {
            run_id,
            events: Mutex::new(BufWriter::new(events)),
        }
    })
}

/// RFC3339 timestamp with milliseconds.
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds.
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry.
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }

    let ctx = ensure_run_context();
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("domain".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("data".to_string(), Value::Object(fields));

    let line = Value::Object(entry).to_string();
    if let Ok(mut w) = ctx.events.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
    eprintln!("{}", line);
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obj_preserves_pairs() {
        let m = obj(&[("a", v_num(1.0)), ("b", v_str("x"))]);
        assert_eq!(m.get("a"), Some(&json!(1.0)));
        assert_eq!(m.get("b"), Some(&json!("x")));
    }

    #[test]
    fn domain_strings_round_trip() {
        for d in [
            Domain::Phase,
            Domain::Market,
            Domain::Trade,
            Domain::Risk,
            Domain::Results,
            Domain::System,
        ] {
            assert!(!d.as_str().is_empty());
        }
    }

    #[test]
    fn log_writes_events_file() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("LOG_DIR", dir.path());
        std::env::set_var("RUN_ID", "test-run");
        log(
            Level::Info,
            Domain::System,
            "startup",
            obj(&[("ok", v_num(1.0))]),
        );
        // RunContext is process-global; if another test initialized it first
        // the file lands under that run dir instead, which is fine.
        let path = dir.path().join("test-run/events.jsonl");
        if path.exists() {
            let body = std::fs::read_to_string(path).unwrap();
            assert!(body.contains("\"event\":\"startup\""));
        }
    }
}
