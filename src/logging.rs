//! Structured audit logging.
//!
//! Every regulatory-relevant mutation and decision leaves a JSONL trail:
//! rule-parameter changes, country reclassification, counter overrides,
//! lock lifecycle, and the outcome of every validated operation. The log is
//! the reconstruction path for "why was this transfer rejected" questions
//! long after the fact.
//!
//! Output goes to `events.jsonl` under `LOG_DIR` (default `out/runs`),
//! one run directory per process. `LOG_LEVEL` and `LOG_DOMAINS` filter at
//! emit time.

use chrono::Utc;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("debug") => Level::Debug,
            Ok("warn") => Level::Warn,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Config,
    Counters,
    Rules,
    Locks,
    Partitions,
    Storage,
    System,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Config => "config",
            Domain::Counters => "counters",
            Domain::Rules => "rules",
            Domain::Locks => "locks",
            Domain::Partitions => "partitions",
            Domain::Storage => "storage",
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

struct RunContext {
    run_id: String,
    events: Mutex<BufWriter<File>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", Utc::now().timestamp_millis(), process::id()));
        let base = std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".to_string());
        let mut run_dir = PathBuf::from(base);
        run_dir.push(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
        }
        let events_path = run_dir.join("events.jsonl");
        let events = File::create(events_path).unwrap_or_else(|err| {
            eprintln!("[log] failed to create events log: {}", err);
            File::create(std::env::temp_dir().join("regtoken-events.jsonl"))
                .expect("events fallback")
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

/// Emit a structured log entry.
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    let ctx = ensure_run_context();
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert(
        "seq".to_string(),
        json!(LOG_SEQ.fetch_add(1, Ordering::SeqCst)),
    );
    entry.insert("lvl".to_string(), json!(level.as_str()));
    entry.insert("domain".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("data".to_string(), Value::Object(fields));
    let line = Value::Object(entry).to_string();
    if let Ok(mut w) = ctx.events.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// ---------------------------------------------------------------------------
// Audit helpers
// ---------------------------------------------------------------------------

pub fn rule_changed_uint(name: &str, old: u64, new: u64) {
    log(
        Level::Info,
        Domain::Config,
        "rule_changed",
        obj(&[
            ("name", v_str(name)),
            ("old", v_u64(old)),
            ("new", v_u64(new)),
        ]),
    );
}

pub fn rule_changed_flag(name: &str, old: bool, new: bool) {
    log(
        Level::Info,
        Domain::Config,
        "rule_changed",
        obj(&[("name", v_str(name)), ("old", json!(old)), ("new", json!(new))]),
    );
}

pub fn country_changed(country: &str, old: crate::region::Region, new: crate::region::Region) {
    log(
        Level::Info,
        Domain::Config,
        "country_changed",
        obj(&[
            ("country", v_str(country)),
            ("old", v_str(old.as_str())),
            ("new", v_str(new.as_str())),
        ]),
    );
}

pub fn counter_override(name: &str, old: u64, new: u64) {
    log(
        Level::Warn,
        Domain::Counters,
        "counter_override",
        obj(&[
            ("name", v_str(name)),
            ("old", v_u64(old)),
            ("new", v_u64(new)),
        ]),
    );
}

/// Outcome of a validated operation.
pub fn decision(op: &str, from: &str, to: &str, value: u64, code: u32, reason: &str) {
    let level = if code == 0 { Level::Debug } else { Level::Info };
    log(
        level,
        Domain::Rules,
        "decision",
        obj(&[
            ("op", v_str(op)),
            ("from", v_str(from)),
            ("to", v_str(to)),
            ("value", v_u64(value)),
            ("code", json!(code)),
            ("reason", v_str(reason)),
        ]),
    );
}

pub fn lock_event(event: &str, investor: &str, value: u64, release_time: u64) {
    log(
        Level::Info,
        Domain::Locks,
        event,
        obj(&[
            ("investor", v_str(investor)),
            ("value", v_u64(value)),
            ("release_time", v_u64(release_time)),
        ]),
    );
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

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

pub fn v_u64(n: u64) -> Value {
    json!(n)
}

/// Short stable fingerprint for config snapshots in audit entries.
pub fn params_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_hash_is_stable_and_short() {
        let a = params_hash("total_investors_limit=5");
        let b = params_hash("total_investors_limit=5");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, params_hash("total_investors_limit=6"));
    }

    #[test]
    fn level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
    }
}
