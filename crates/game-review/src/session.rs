//! Engine session over the UCI protocol (async I/O)
//!
//! One background task owns the engine's stdin/stdout. Callers talk to it
//! through an [`EngineSession`] handle; every search request carries a token,
//! and each `go` sent to the engine pushes that token onto a FIFO. A
//! `bestmove` line pops the FIFO, so a terminating line that belongs to a
//! superseded search is recognised and discarded instead of resolving a newer
//! request.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::config::ReviewConfig;
use crate::error::SessionError;
use crate::evaluation::{EvalSource, EvaluationResult};
use crate::protocol::{parse_line, EngineCommand, EngineLine, SearchUpdate};

/// Receives every depth-by-depth update of a streaming search.
pub type Observer = Arc<dyn Fn(SearchUpdate) + Send + Sync>;

type EvalReply = oneshot::Sender<Result<EvaluationResult, SessionError>>;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Deadline for a single awaited evaluation
    pub eval_timeout: Duration,
    /// Deadline for `uciok` and `readyok` during start-up
    pub handshake_timeout: Duration,
    /// How long a new search waits for interrupted searches to send their
    /// `bestmove` before they are given up on
    pub stop_grace: Duration,
    /// Sent as `setoption` lines between `uciok` and `isready`
    pub engine_options: Vec<(String, String)>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            eval_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            stop_grace: Duration::from_secs(2),
            engine_options: Vec::new(),
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &ReviewConfig) -> Self {
        let mut engine_options = vec![
            ("Threads".to_string(), config.engine_threads.to_string()),
            ("Hash".to_string(), config.engine_hash_mb.to_string()),
            ("UCI_AnalyseMode".to_string(), "true".to_string()),
        ];
        if let Some(level) = config.skill_level {
            engine_options.push(("Skill Level".to_string(), level.to_string()));
        }
        Self {
            eval_timeout: config.eval_timeout,
            engine_options,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

#[derive(Debug, Clone)]
struct SessionStatus {
    state: SessionState,
    engine_name: Option<String>,
    /// Set only when the handshake failed
    failure: Option<String>,
}

enum Request {
    SetOption {
        name: String,
        value: String,
    },
    SetObserver(Option<Observer>),
    Stream {
        fen: String,
        depth: u32,
    },
    Evaluate {
        fen: String,
        depth: u32,
        reply: EvalReply,
    },
    Stop,
    Quit,
}

/// Something that can evaluate a position to a target depth.
#[async_trait]
pub trait PositionEvaluator: Send + Sync {
    async fn evaluate_position(
        &self,
        fen: &str,
        depth: u32,
    ) -> Result<EvaluationResult, SessionError>;
}

/// Handle to a running engine session.
///
/// Dropping the handle ends the session task; a spawned engine process is
/// killed with it.
pub struct EngineSession {
    requests: mpsc::UnboundedSender<Request>,
    status: watch::Receiver<SessionStatus>,
}

impl EngineSession {
    /// Launch an engine binary and start the handshake.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(path: &str, options: SessionOptions) -> Result<Self, SessionError> {
        let spawn_error = |source| SessionError::Spawn {
            path: path.to_string(),
            source,
        };

        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        let missing_pipe = || spawn_error(std::io::Error::other("engine stdio not captured"));
        let stdin = child.stdin.take().ok_or_else(missing_pipe)?;
        let stdout = child.stdout.take().ok_or_else(missing_pipe)?;

        info!(path, "Spawned engine");
        Ok(Self::start(stdout, stdin, options, Some(child)))
    }

    /// Attach a session to an arbitrary byte channel speaking the protocol.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_io<R, W>(reader: R, writer: W, options: SessionOptions) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::start(reader, writer, options, None)
    }

    fn start<R, W>(reader: R, writer: W, options: SessionOptions, child: Option<Child>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus {
            state: SessionState::Uninitialized,
            engine_name: None,
            failure: None,
        });

        let task = SessionTask::new(writer, options, status_tx);
        tokio::spawn(task.run(reader, request_rx, child));

        Self {
            requests: request_tx,
            status: status_rx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    /// Name from the engine's `id name` line.
    pub fn engine_name(&self) -> Option<String> {
        self.status.borrow().engine_name.clone()
    }

    /// Wait until the handshake completes, or report why it failed.
    pub async fn wait_ready(&self) -> Result<(), SessionError> {
        let mut status = self.status.clone();
        let (state, failure) = {
            let current = status
                .wait_for(|s| matches!(s.state, SessionState::Ready | SessionState::Failed))
                .await
                .map_err(|_| self.closed_error())?;
            (current.state, current.failure.clone())
        };
        match (state, failure) {
            (SessionState::Ready, _) => Ok(()),
            (_, Some(reason)) => Err(SessionError::Handshake(reason)),
            _ => Err(SessionError::Closed),
        }
    }

    /// Queue a `setoption` for the engine. Takes effect on the next search.
    pub fn set_option(&self, name: &str, value: &str) -> Result<(), SessionError> {
        self.send(Request::SetOption {
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    pub fn set_observer<F>(&self, observer: F) -> Result<(), SessionError>
    where
        F: Fn(SearchUpdate) + Send + Sync + 'static,
    {
        self.send(Request::SetObserver(Some(Arc::new(observer))))
    }

    pub fn clear_observer(&self) -> Result<(), SessionError> {
        self.send(Request::SetObserver(None))
    }

    /// Fire-and-forget search. Replaces any active search; updates go to the
    /// observer in non-decreasing depth order.
    pub fn evaluate_streaming(&self, fen: &str, depth: u32) -> Result<(), SessionError> {
        self.send(Request::Stream {
            fen: fen.to_string(),
            depth,
        })
    }

    /// Search to `depth` and resolve once with the final result.
    ///
    /// Replaces any active search. If the engine has not finished when the
    /// eval timeout fires, resolves with the deepest partial result and
    /// `EvalSource::TimedOut`.
    pub async fn evaluate(&self, fen: &str, depth: u32) -> Result<EvaluationResult, SessionError> {
        let (reply, result) = oneshot::channel();
        self.send(Request::Evaluate {
            fen: fen.to_string(),
            depth,
            reply,
        })?;
        result.await.map_err(|_| self.closed_error())?
    }

    /// Interrupt the active search. Safe to call when idle.
    pub fn stop(&self) -> Result<(), SessionError> {
        self.send(Request::Stop)
    }

    /// Send `quit` and wait for the session task to finish.
    pub async fn quit(self) {
        if self.requests.send(Request::Quit).is_ok() {
            self.requests.closed().await;
        }
    }

    fn send(&self, request: Request) -> Result<(), SessionError> {
        self.requests.send(request).map_err(|_| self.closed_error())
    }

    fn closed_error(&self) -> SessionError {
        match &self.status.borrow().failure {
            Some(reason) => SessionError::Handshake(reason.clone()),
            None => SessionError::Closed,
        }
    }
}

#[async_trait]
impl PositionEvaluator for EngineSession {
    async fn evaluate_position(
        &self,
        fen: &str,
        depth: u32,
    ) -> Result<EvaluationResult, SessionError> {
        self.evaluate(fen, depth).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitUciOk,
    AwaitReadyOk,
    Ready,
}

/// The one search whose output is currently relevant.
enum ActiveSearch {
    Idle,
    Streaming {
        token: u64,
        last_depth: u32,
    },
    AwaitingOne {
        token: u64,
        reply: EvalReply,
        partial: Option<SearchUpdate>,
        deadline: Instant,
    },
}

impl ActiveSearch {
    fn token(&self) -> Option<u64> {
        match self {
            ActiveSearch::Idle => None,
            ActiveSearch::Streaming { token, .. } | ActiveSearch::AwaitingOne { token, .. } => {
                Some(*token)
            }
        }
    }
}

/// A search held back until every earlier `go` has been answered.
struct PendingStart {
    token: u64,
    fen: String,
    depth: u32,
    /// After this, unanswered earlier searches are dropped
    grace_deadline: Instant,
}

enum Flow {
    Continue,
    Exit,
}

struct SessionTask<W> {
    writer: W,
    options: SessionOptions,
    status: watch::Sender<SessionStatus>,
    phase: Phase,
    handshake_deadline: Instant,
    /// Requests received before the engine was ready, in arrival order
    backlog: VecDeque<Request>,
    active: ActiveSearch,
    /// One token per `go` sent, oldest first; popped by `bestmove`
    in_flight: VecDeque<u64>,
    /// The most recent `go` has not been answered or stopped yet
    running_unstopped: bool,
    pending: Option<PendingStart>,
    next_token: u64,
    observer: Option<Observer>,
}

impl<W: AsyncWrite + Unpin + Send> SessionTask<W> {
    fn new(writer: W, options: SessionOptions, status: watch::Sender<SessionStatus>) -> Self {
        let handshake_deadline = Instant::now() + options.handshake_timeout;
        Self {
            writer,
            options,
            status,
            phase: Phase::AwaitUciOk,
            handshake_deadline,
            backlog: VecDeque::new(),
            active: ActiveSearch::Idle,
            in_flight: VecDeque::new(),
            running_unstopped: false,
            pending: None,
            next_token: 0,
            observer: None,
        }
    }

    async fn run<R>(
        mut self,
        reader: R,
        mut requests: mpsc::UnboundedReceiver<Request>,
        child: Option<Child>,
    ) where
        R: AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();

        self.status
            .send_modify(|s| s.state = SessionState::Initializing);
        if let Err(e) = self.send(EngineCommand::Uci).await {
            self.fail_handshake(format!("failed to send uci: {e}"));
            return;
        }

        loop {
            let outcome = tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.on_line(&line).await,
                    Ok(None) => Err(SessionError::Closed),
                    Err(e) => Err(SessionError::Io(e)),
                },
                request = requests.recv() => match request {
                    Some(request) => self.on_request(request).await,
                    None => Ok(Flow::Exit),
                },
                _ = sleep_until_opt(self.deadline()) => self.on_deadline().await,
            };

            match outcome {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => {
                    let _ = self.send(EngineCommand::Quit).await;
                    break;
                }
                Err(e) => {
                    self.on_engine_lost(e);
                    break;
                }
            }
        }

        if let Some(mut child) = child {
            if timeout(Duration::from_secs(1), child.wait()).await.is_err() {
                let _ = child.start_kill();
            }
        }
        debug!("Engine session task finished");
    }

    /// Send a command to the engine
    async fn send(&mut self, command: EngineCommand<'_>) -> Result<(), SessionError> {
        let cmd = command.to_string();
        debug!(cmd = cmd.as_str(), "SF <");
        self.writer.write_all(format!("{cmd}\n").as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    fn deadline(&self) -> Option<Instant> {
        if self.phase != Phase::Ready {
            return Some(self.handshake_deadline);
        }
        let eval = match &self.active {
            ActiveSearch::AwaitingOne { deadline, .. } => Some(*deadline),
            _ => None,
        };
        let grace = self.pending.as_ref().map(|p| p.grace_deadline);
        eval.into_iter().chain(grace).min()
    }

    async fn on_line(&mut self, line: &str) -> Result<Flow, SessionError> {
        let trimmed = line.trim();
        debug!(line = trimmed, "SF >");

        let Some(parsed) = parse_line(trimmed) else {
            return Ok(Flow::Continue);
        };

        match (self.phase, parsed) {
            (_, EngineLine::Id { name }) => {
                self.status.send_modify(|s| s.engine_name = Some(name));
            }
            (Phase::AwaitUciOk, EngineLine::UciOk) => {
                let options = self.options.engine_options.clone();
                for (name, value) in &options {
                    self.send(EngineCommand::SetOption { name, value }).await?;
                }
                self.send(EngineCommand::IsReady).await?;
                self.phase = Phase::AwaitReadyOk;
            }
            (Phase::AwaitReadyOk, EngineLine::ReadyOk) => {
                self.phase = Phase::Ready;
                self.status.send_modify(|s| s.state = SessionState::Ready);
                info!(backlog = self.backlog.len(), "Engine ready");
                while let Some(request) = self.backlog.pop_front() {
                    if let Flow::Exit = self.handle(request).await? {
                        return Ok(Flow::Exit);
                    }
                }
            }
            (Phase::Ready, EngineLine::Info(update)) => self.on_info(update),
            (Phase::Ready, EngineLine::BestMove(mv)) => self.on_bestmove(mv).await?,
            _ => {}
        }
        Ok(Flow::Continue)
    }

    fn on_info(&mut self, update: SearchUpdate) {
        if self.in_flight.front().copied() != self.active.token() {
            return;
        }
        match &mut self.active {
            ActiveSearch::Streaming { last_depth, .. } => {
                if update.depth < *last_depth {
                    return;
                }
                *last_depth = update.depth;
                if let Some(observer) = &self.observer {
                    observer(update);
                }
            }
            ActiveSearch::AwaitingOne { partial, .. } => {
                if partial.as_ref().map_or(true, |p| update.depth >= p.depth) {
                    *partial = Some(update);
                }
            }
            ActiveSearch::Idle => {}
        }
    }

    async fn on_bestmove(&mut self, mv: Option<String>) -> Result<(), SessionError> {
        let Some(token) = self.in_flight.pop_front() else {
            debug!("bestmove with no search in flight");
            return Ok(());
        };
        if self.in_flight.is_empty() {
            self.running_unstopped = false;
        }
        if Some(token) != self.active.token() {
            debug!(token, "Discarding stale bestmove");
            if self.in_flight.is_empty() {
                self.launch_pending().await?;
            }
            return Ok(());
        }

        match std::mem::replace(&mut self.active, ActiveSearch::Idle) {
            ActiveSearch::AwaitingOne { reply, partial, .. } => {
                let result = EvaluationResult::from_search(partial, mv, EvalSource::Engine);
                let _ = reply.send(Ok(result));
            }
            ActiveSearch::Streaming { .. } | ActiveSearch::Idle => {}
        }
        Ok(())
    }

    async fn on_request(&mut self, request: Request) -> Result<Flow, SessionError> {
        if self.phase == Phase::Ready {
            return self.handle(request).await;
        }
        // Nothing reaches the engine before readyok
        if let Request::Quit = request {
            return Ok(Flow::Exit);
        }
        self.backlog.push_back(request);
        Ok(Flow::Continue)
    }

    async fn handle(&mut self, request: Request) -> Result<Flow, SessionError> {
        match request {
            Request::SetOption { name, value } => {
                self.send(EngineCommand::SetOption {
                    name: &name,
                    value: &value,
                })
                .await?;
            }
            Request::SetObserver(observer) => self.observer = observer,
            Request::Stream { fen, depth } => {
                let token = self.start_search(&fen, depth).await?;
                self.active = ActiveSearch::Streaming {
                    token,
                    last_depth: 0,
                };
            }
            Request::Evaluate { fen, depth, reply } => {
                let token = self.start_search(&fen, depth).await?;
                self.active = ActiveSearch::AwaitingOne {
                    token,
                    reply,
                    partial: None,
                    deadline: Instant::now() + self.options.eval_timeout,
                };
            }
            Request::Stop => {
                if let ActiveSearch::AwaitingOne { reply, .. } =
                    std::mem::replace(&mut self.active, ActiveSearch::Idle)
                {
                    let _ = reply.send(Err(SessionError::Cancelled));
                }
                self.pending = None;
                self.interrupt().await?;
            }
            Request::Quit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }

    /// Supersede the active search and start a new one. While an earlier
    /// search still owes its `bestmove` the new `go` is held back, so every
    /// `bestmove` can be matched to the search that produced it.
    async fn start_search(&mut self, fen: &str, depth: u32) -> Result<u64, SessionError> {
        if let ActiveSearch::AwaitingOne { token, reply, .. } =
            std::mem::replace(&mut self.active, ActiveSearch::Idle)
        {
            warn!(token, "Awaited evaluation superseded by a newer request");
            let _ = reply.send(Err(SessionError::Superseded));
        }
        self.interrupt().await?;

        let token = self.next_token;
        self.next_token += 1;
        if self.in_flight.is_empty() {
            self.pending = None;
            self.send_go(token, fen, depth).await?;
        } else {
            debug!(
                token,
                waiting_on = self.in_flight.len(),
                "Holding search until stop is answered"
            );
            let grace_deadline = Instant::now() + self.options.stop_grace;
            self.pending = Some(PendingStart {
                token,
                fen: fen.to_string(),
                depth,
                grace_deadline,
            });
        }
        Ok(token)
    }

    async fn send_go(&mut self, token: u64, fen: &str, depth: u32) -> Result<(), SessionError> {
        self.send(EngineCommand::Position { fen }).await?;
        self.send(EngineCommand::GoDepth(depth)).await?;
        self.in_flight.push_back(token);
        self.running_unstopped = true;
        Ok(())
    }

    async fn launch_pending(&mut self) -> Result<(), SessionError> {
        if let Some(PendingStart {
            token, fen, depth, ..
        }) = self.pending.take()
        {
            self.send_go(token, &fen, depth).await?;
        }
        Ok(())
    }

    /// The engine never answered `stop` for the searches still in flight.
    async fn expire_stale(&mut self) -> Result<(), SessionError> {
        warn!(
            stale = self.in_flight.len(),
            "Engine did not answer stop in time, dropping stale searches"
        );
        self.in_flight.clear();
        self.running_unstopped = false;
        self.launch_pending().await
    }

    /// Send `stop` if the latest search is still running.
    async fn interrupt(&mut self) -> Result<(), SessionError> {
        if self.running_unstopped {
            self.running_unstopped = false;
            self.send(EngineCommand::Stop).await?;
        }
        Ok(())
    }

    async fn on_deadline(&mut self) -> Result<Flow, SessionError> {
        if self.phase != Phase::Ready {
            let reason = format!(
                "no {} within {:?}",
                if self.phase == Phase::AwaitUciOk { "uciok" } else { "readyok" },
                self.options.handshake_timeout
            );
            self.fail_handshake(reason);
            return Ok(Flow::Exit);
        }

        let now = Instant::now();
        if self.pending.as_ref().is_some_and(|p| p.grace_deadline <= now) {
            self.expire_stale().await?;
        }

        let expired = matches!(
            &self.active,
            ActiveSearch::AwaitingOne { deadline, .. } if *deadline <= now
        );
        if !expired {
            return Ok(Flow::Continue);
        }

        // The token stays in flight so the late bestmove is discarded
        if let ActiveSearch::AwaitingOne {
            token,
            reply,
            partial,
            ..
        } = std::mem::replace(&mut self.active, ActiveSearch::Idle)
        {
            if self.pending.as_ref().is_some_and(|p| p.token == token) {
                self.pending = None;
            }
            warn!(
                token,
                depth = partial.as_ref().map(|p| p.depth).unwrap_or(0),
                "Evaluation timed out, using partial result"
            );
            self.interrupt().await?;
            let result = EvaluationResult::from_search(partial, None, EvalSource::TimedOut);
            let _ = reply.send(Ok(result));
        }
        Ok(Flow::Continue)
    }

    fn fail_handshake(&mut self, reason: String) {
        error!(reason = reason.as_str(), "Engine handshake failed");
        for request in self.backlog.drain(..) {
            if let Request::Evaluate { reply, .. } = request {
                let _ = reply.send(Err(SessionError::Handshake(reason.clone())));
            }
        }
        self.status.send_modify(|s| {
            s.state = SessionState::Failed;
            s.failure = Some(reason);
        });
    }

    fn on_engine_lost(&mut self, cause: SessionError) {
        if self.phase != Phase::Ready {
            self.fail_handshake(format!("engine exited during handshake: {cause}"));
            return;
        }
        error!(error = %cause, "Engine connection lost");
        if let ActiveSearch::AwaitingOne { reply, .. } =
            std::mem::replace(&mut self.active, ActiveSearch::Idle)
        {
            let _ = reply.send(Err(SessionError::Closed));
        }
        self.status.send_modify(|s| s.state = SessionState::Failed);
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let result = EngineSession::spawn(
            "/nonexistent/path/to/stockfish",
            SessionOptions::default(),
        );
        assert!(matches!(result, Err(SessionError::Spawn { .. })));
    }

    #[test]
    fn test_options_from_config() {
        let config = ReviewConfig {
            skill_level: Some(3),
            ..ReviewConfig::default()
        };
        let options = SessionOptions::from_config(&config);
        assert_eq!(options.eval_timeout, config.eval_timeout);
        assert!(options
            .engine_options
            .contains(&("Skill Level".to_string(), "3".to_string())));
        assert_eq!(options.engine_options[0].0, "Threads");
    }

    #[tokio::test]
    async fn test_handshake_timeout_fails_session() {
        // Engine side never answers
        let (client, _engine) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(client);
        let options = SessionOptions {
            handshake_timeout: Duration::from_millis(50),
            ..SessionOptions::default()
        };
        let session = EngineSession::from_io(reader, writer, options);
        let err = session.wait_ready().await.unwrap_err();
        assert!(matches!(err, SessionError::Handshake(_)));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(matches!(
            session.evaluate("8/8/8/8/8/8/8/8 w - - 0 1", 4).await,
            Err(SessionError::Handshake(_))
        ));
    }
}
