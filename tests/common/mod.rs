//! Shared test doubles: a scripted UCI engine speaking over an in-memory
//! pipe, and a scripted evaluator for pipeline tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::time::sleep;

use chess_core::{PositionSnapshot, Side};
use game_review::{
    EngineSession, EvalSource, EvaluationResult, PositionEvaluator, SessionError, SessionOptions,
};

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
pub const AFTER_E4_FEN: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
/// Searches on this position never finish on their own.
pub const STALL_FEN: &str = "4k3/8/8/8/8/8/8/4K2R w K - 0 1";

/// What the fake engine reports at the requested depth for one position.
#[derive(Debug, Clone)]
pub struct Answer {
    /// `"cp 35"` or `"mate 2"`
    pub score: String,
    pub pv: Vec<String>,
}

impl Answer {
    pub fn cp(cp: i32, pv: &[&str]) -> Self {
        Self {
            score: format!("cp {cp}"),
            pv: pv.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn mate(moves: i32, pv: &[&str]) -> Self {
        Self {
            score: format!("mate {moves}"),
            pv: pv.iter().map(|m| m.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeScript {
    /// Delay before answering `uci`
    pub handshake_delay: Duration,
    /// Delay between `stop` and the `bestmove` it causes
    pub stop_delay: Duration,
    /// Never answer `stop` for a stalled search
    pub ignore_stop: bool,
    pub stall: HashSet<String>,
    pub answers: HashMap<String, Answer>,
}

impl FakeScript {
    pub fn new() -> Self {
        let mut script = Self::default();
        script.stall.insert(STALL_FEN.to_string());
        script
            .answers
            .insert(START_FEN.to_string(), Answer::cp(35, &["e2e4", "e7e5"]));
        script
            .answers
            .insert(AFTER_E4_FEN.to_string(), Answer::cp(-30, &["e7e5", "g1f3"]));
        script
    }
}

pub type CommandLog = Arc<Mutex<Vec<String>>>;

pub fn commands(log: &CommandLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn position_of(log: &CommandLog, prefix: &str) -> Option<usize> {
    commands(log).iter().position(|c| c.starts_with(prefix))
}

/// Start a session wired to a fake engine running `script`.
pub fn start_fake(script: FakeScript, options: SessionOptions) -> (EngineSession, CommandLog) {
    let (client, engine) = tokio::io::duplex(64 * 1024);
    let (reader, writer) = tokio::io::split(client);
    let session = EngineSession::from_io(reader, writer, options);

    let log: CommandLog = Arc::new(Mutex::new(Vec::new()));
    tokio::spawn(run_fake_engine(engine, script, log.clone()));
    (session, log)
}

pub fn quick_options() -> SessionOptions {
    SessionOptions {
        eval_timeout: Duration::from_millis(300),
        handshake_timeout: Duration::from_secs(2),
        stop_grace: Duration::from_millis(150),
        engine_options: vec![("Threads".to_string(), "1".to_string())],
    }
}

async fn write_lines(out: &mut (impl AsyncWriteExt + Unpin), lines: &[String]) {
    let mut text = lines.join("\n");
    text.push('\n');
    let _ = out.write_all(text.as_bytes()).await;
    let _ = out.flush().await;
}

async fn run_fake_engine(engine: DuplexStream, script: FakeScript, log: CommandLog) {
    let (reader, mut writer) = tokio::io::split(engine);
    let mut lines = BufReader::new(reader).lines();
    let mut current = String::new();
    let mut stalled = false;

    while let Ok(Some(line)) = lines.next_line().await {
        let cmd = line.trim().to_string();
        log.lock().unwrap().push(cmd.clone());

        if cmd == "uci" {
            sleep(script.handshake_delay).await;
            write_lines(
                &mut writer,
                &[
                    "id name FakeFish 1.0".to_string(),
                    "id author nobody".to_string(),
                    "option name Threads type spin default 1 min 1 max 512".to_string(),
                    "uciok".to_string(),
                ],
            )
            .await;
        } else if cmd == "isready" {
            write_lines(&mut writer, &["readyok".to_string()]).await;
        } else if let Some(fen) = cmd.strip_prefix("position fen ") {
            current = fen.to_string();
        } else if let Some(depth) = cmd.strip_prefix("go depth ") {
            let depth: u32 = depth.parse().unwrap_or(1);
            if script.stall.contains(&current) {
                let partial: Vec<String> = (1..=3)
                    .map(|d| format!("info depth {d} score cp {} pv h1h8", d * 10))
                    .collect();
                write_lines(&mut writer, &partial).await;
                stalled = true;
            } else {
                let answer = script
                    .answers
                    .get(&current)
                    .cloned()
                    .unwrap_or_else(|| Answer::cp(0, &[]));
                write_lines(&mut writer, &search_output(depth, &answer)).await;
            }
        } else if cmd == "stop" {
            if stalled && script.ignore_stop {
                stalled = false;
            } else if stalled {
                sleep(script.stop_delay).await;
                write_lines(&mut writer, &["bestmove h1h8".to_string()]).await;
                stalled = false;
            }
        } else if cmd == "quit" {
            break;
        }
    }
}

/// Depth-by-depth output for a search that runs to completion. Intermediate
/// depths carry a distinct score; the noise after the final depth must not
/// change the result.
fn search_output(depth: u32, answer: &Answer) -> Vec<String> {
    let mut out: Vec<String> = (1..depth)
        .map(|d| {
            let cp = -500 + d as i32;
            format!("info depth {d} seldepth {d} score cp {cp} nodes 100 pv h2h3")
        })
        .collect();
    let pv = answer.pv.join(" ");
    out.push(format!(
        "info depth {depth} seldepth {depth} multipv 1 score {} nodes 99999 nps 1000000 pv {pv}",
        answer.score
    ));
    out.push(format!("info depth {depth} multipv 2 score cp 777 pv a2a4"));
    out.push("info string garbage ### ignored".to_string());
    out.push("!!not a protocol line".to_string());
    out.push("info depth 1 score cp -999 pv a2a3".to_string());
    out.push(format!(
        "bestmove {}",
        answer.pv.first().map(String::as_str).unwrap_or("(none)")
    ));
    out
}

/// Evaluator answering from a table keyed by FEN; unknown positions score 0.
#[derive(Default)]
pub struct ScriptedEvaluator {
    results: HashMap<String, EvaluationResult>,
    calls: AtomicUsize,
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a position with a White-perspective score; the stored result
    /// is side-to-move relative, as an engine would report it.
    pub fn with_white_score(
        mut self,
        snapshot: &PositionSnapshot,
        white_score: f64,
        is_mate: bool,
        pv: &[&str],
    ) -> Self {
        let score = match snapshot.side_to_move {
            Side::White => white_score,
            Side::Black => -white_score,
        };
        self.results.insert(
            snapshot.fen.clone(),
            EvaluationResult {
                depth: 12,
                score,
                is_mate,
                pv: pv.iter().map(|m| m.to_string()).collect(),
                best_move: pv.first().map(|m| m.to_string()),
                source: EvalSource::Engine,
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PositionEvaluator for ScriptedEvaluator {
    async fn evaluate_position(
        &self,
        fen: &str,
        depth: u32,
    ) -> Result<EvaluationResult, SessionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.get(fen).cloned().unwrap_or(EvaluationResult {
            depth,
            score: 0.0,
            is_mate: false,
            pv: vec![],
            best_move: None,
            source: EvalSource::Engine,
        }))
    }
}

