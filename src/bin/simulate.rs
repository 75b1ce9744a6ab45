use chrono::{SecondsFormat, Utc};
use clap::Parser;
use pacman_ghost_ai::config::{ConfigError, TuningConfig};
use pacman_ghost_ai::constants::{DEFAULT_TIME_LIMIT_MS, TICK_MS, TICK_RATE};
use pacman_ghost_ai::engine::{GameEngine, GameEngineOptions};
use pacman_ghost_ai::level::{Level, LevelError};
use pacman_ghost_ai::pathfinding::SearchAlgorithm;
use pacman_ghost_ai::types::{GameOverReason, GhostMode, RuntimeEvent, Snapshot, Vec2};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// ASCII level layout; the built-in maze when omitted.
    #[arg(long)]
    level: Option<PathBuf>,
    /// JSON tuning overrides.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    seconds: Option<u64>,
    /// `bfs` or `astar`; overrides the config file.
    #[arg(long)]
    algorithm: Option<String>,
    /// Number of runs, each on the next seed.
    #[arg(long, default_value_t = 1)]
    runs: u32,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum SetupError {
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unknown search algorithm {0:?} (expected bfs or astar)")]
    UnknownAlgorithm(String),
}

#[derive(Clone, Debug)]
struct Setup {
    level: Level,
    tuning: TuningConfig,
    time_limit_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunResultLine {
    run: u32,
    seed: u64,
    algorithm: SearchAlgorithm,
    reason: GameOverReason,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    score: i32,
    lives: i32,
    #[serde(rename = "foodEaten")]
    food_eaten: usize,
    #[serde(rename = "foodLeft")]
    food_left: usize,
    #[serde(rename = "ghostsEaten")]
    ghosts_eaten: i32,
    #[serde(rename = "livesLost")]
    lives_lost: i32,
    #[serde(rename = "modeChanges")]
    mode_changes: usize,
    #[serde(rename = "pathSearches")]
    path_searches: u64,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct RunOutcome {
    #[serde(flatten)]
    result: RunResultLine,
    #[serde(rename = "anomalyRecords")]
    anomaly_records: Vec<AnomalyRecord>,
    finished_tick: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "generatedAt")]
    generated_at: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "runCount")]
    run_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageDurationMs")]
    average_duration_ms: u64,
    #[serde(rename = "averageScore")]
    average_score: i32,
    #[serde(rename = "reasonCounts")]
    reason_counts: BTreeMap<String, usize>,
    runs: Vec<RunResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    timestamp_ms: u64,
    level: String,
    event: String,
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick: Option<u64>,
    details: Value,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let run_started_at_ms = now_ms();
    let base_seed = cli.seed.unwrap_or(run_started_at_ms);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(base_seed, run_started_at_ms));

    let setup = match load_setup(&cli) {
        Ok(setup) => setup,
        Err(error) => {
            emit_log(
                "error",
                "setup_failed",
                &match_id,
                None,
                None,
                json!({ "error": error.to_string() }),
            );
            std::process::exit(2);
        }
    };

    emit_log(
        "info",
        "run_started",
        &match_id,
        Some(base_seed),
        None,
        json!({
            "runs": cli.runs,
            "algorithm": setup.tuning.algorithm,
            "timeLimitMs": setup.time_limit_ms,
            "width": setup.level.width(),
            "height": setup.level.height(),
            "ghosts": setup.level.ghost_spawns().len(),
        }),
    );

    let mut has_anomaly = false;
    let mut results = Vec::new();
    let mut reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_anomalies = 0usize;

    for run in 0..cli.runs.max(1) {
        let seed = base_seed.wrapping_add(run as u64);
        let outcome = run_scenario(&setup, run, seed);

        for anomaly in &outcome.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &match_id,
                Some(seed),
                Some(anomaly.tick),
                json!({ "message": anomaly.message }),
            );
        }
        if !outcome.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += outcome.anomaly_records.len();
        *reason_counts
            .entry(game_over_reason_key(outcome.result.reason))
            .or_insert(0) += 1;

        emit_log(
            "info",
            "scenario_finished",
            &match_id,
            Some(seed),
            Some(outcome.finished_tick),
            json!({
                "reason": outcome.result.reason,
                "durationMs": outcome.result.duration_ms,
                "score": outcome.result.score,
                "anomalyCount": outcome.anomaly_records.len(),
            }),
        );

        match serde_json::to_string(&outcome.result) {
            Ok(line) => println!("{line}"),
            Err(error) => tracing::warn!(%error, "result line did not serialize"),
        }
        results.push(outcome.result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        run_started_at_ms,
        now_ms(),
        results,
        reason_counts,
        total_anomalies,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &match_id,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &match_id,
        None,
        None,
        json!({
            "runCount": summary.run_count,
            "anomalyCount": summary.anomaly_count,
            "averageDurationMs": summary.average_duration_ms,
            "reasonCounts": summary.reason_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn load_setup(cli: &Cli) -> Result<Setup, SetupError> {
    let level = match cli.level.as_deref() {
        Some(path) => Level::load(path)?,
        None => Level::default_maze()?,
    };
    let mut tuning = match cli.config.as_deref() {
        Some(path) => TuningConfig::load(path)?,
        None => TuningConfig::default(),
    };
    if let Some(name) = cli.algorithm.as_deref() {
        tuning.algorithm = SearchAlgorithm::parse(name)
            .ok_or_else(|| SetupError::UnknownAlgorithm(name.to_string()))?;
    }
    let time_limit_ms = cli
        .seconds
        .map(|seconds| seconds.saturating_mul(1000))
        .unwrap_or(DEFAULT_TIME_LIMIT_MS);
    Ok(Setup {
        level,
        tuning,
        time_limit_ms,
    })
}

fn run_scenario(setup: &Setup, run: u32, seed: u64) -> RunOutcome {
    let mut engine = GameEngine::new(
        setup.level.clone(),
        GameEngineOptions {
            tuning: setup.tuning.clone(),
            seed,
            time_limit_ms: Some(setup.time_limit_ms),
            autopilot: true,
        },
    );
    let ghost_spawns = setup.level.ghost_spawns().to_vec();
    let tick_limit = setup.time_limit_ms / TICK_MS + TICK_RATE as u64 * 60;

    let mut food_eaten = 0usize;
    let mut mode_changes = 0usize;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut last_tick = 0u64;

    while !engine.is_ended() {
        engine.step(TICK_MS);
        let snapshot = engine.build_snapshot(true);
        last_tick = snapshot.tick;
        for message in collect_snapshot_anomalies(&snapshot, &engine.level, &ghost_spawns) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }
        if snapshot.tick > tick_limit {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                "tick safety limit exceeded".to_string(),
            );
            break;
        }

        for event in &snapshot.events {
            match event {
                RuntimeEvent::FoodEaten { .. } => food_eaten += 1,
                RuntimeEvent::ModeChanged { .. } => mode_changes += 1,
                _ => {}
            }
        }
    }

    let summary = engine.build_summary();
    RunOutcome {
        result: RunResultLine {
            run,
            seed,
            algorithm: setup.tuning.algorithm,
            reason: summary.reason,
            duration_ms: summary.duration_ms,
            score: summary.score,
            lives: summary.lives,
            food_eaten,
            food_left: summary.food_left,
            ghosts_eaten: summary.ghosts_eaten,
            lives_lost: summary.lives_lost,
            mode_changes,
            path_searches: summary.path_searches,
            anomalies,
        },
        anomaly_records,
        finished_tick: last_tick,
    }
}

fn collect_snapshot_anomalies(snapshot: &Snapshot, level: &Level, spawns: &[Vec2]) -> Vec<String> {
    let mut anomalies = Vec::new();
    if snapshot.player.lives < 0 {
        anomalies.push(format!("negative lives: {}", snapshot.player.lives));
    }
    let player = Vec2::new(snapshot.player.x, snapshot.player.y);
    if !level.is_walkable(player) {
        anomalies.push(format!("player on non-walkable tile: ({},{})", player.x, player.y));
    }

    for (idx, ghost) in snapshot.ghosts.iter().enumerate() {
        let pos = Vec2::new(ghost.x, ghost.y);
        if !level.is_walkable(pos) {
            anomalies.push(format!(
                "ghost on non-walkable tile: {} ({},{})",
                ghost.id, pos.x, pos.y
            ));
        }
        if ghost.mode == GhostMode::Dead {
            let spawn = spawns.get(idx).copied();
            if ghost.target.is_some() && ghost.target != spawn {
                anomalies.push(format!("dead ghost not heading home: {}", ghost.id));
            }
        }
    }
    anomalies
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u64, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    runs: Vec<RunResultLine>,
    reason_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
) -> RunSummary {
    let run_count = runs.len();
    let (average_duration_ms, average_score) = if run_count == 0 {
        (0, 0)
    } else {
        let total_duration: u64 = runs.iter().map(|run| run.duration_ms).sum();
        let total_score: i64 = runs.iter().map(|run| run.score as i64).sum();
        (
            total_duration / run_count as u64,
            (total_score / run_count as i64) as i32,
        )
    };
    RunSummary {
        match_id,
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        started_at_ms,
        finished_at_ms,
        run_count,
        anomaly_count,
        average_duration_ms,
        average_score,
        reason_counts,
        runs,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    match_id: &str,
    seed: Option<u64>,
    tick: Option<u64>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        match_id: match_id.to_string(),
        seed,
        tick,
        details,
    };
    match serde_json::to_string(&log_line) {
        Ok(line) => eprintln!("{line}"),
        Err(error) => tracing::warn!(%error, event, "structured log did not serialize"),
    }
}

fn game_over_reason_key(reason: GameOverReason) -> String {
    match reason {
        GameOverReason::Victory => "victory",
        GameOverReason::OutOfLives => "out_of_lives",
        GameOverReason::Timeout => "timeout",
    }
    .to_string()
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}
