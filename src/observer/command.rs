//! Observers backed by an external command.
//!
//! The speech-to-text engine and the emotion model live in separate
//! programs. Each observer runs its program through `sh -c`, reads stdout
//! line by line on a supervised task, and keeps the latest output in memory.
//! Stopping cancels the reader, kills the child and joins the task.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{EmotionObserver, ObserverFactory, ObserverKind, TranscriptObserver};
use crate::config::ObserverConfig;
use crate::session::SessionMetrics;

/// A child process plus the task draining its stdout.
struct SupervisedProcess {
    cancel: CancellationToken,
    reader: JoinHandle<()>,
}

impl SupervisedProcess {
    fn spawn<F>(kind: ObserverKind, command: &str, on_line: F) -> Result<Self>
    where
        F: FnMut(String) + Send + 'static,
    {
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {} command: {}", kind, command))?;

        info!("{} observer process started (pid {:?})", kind, child.id());

        let cancel = CancellationToken::new();
        let reader = tokio::spawn(read_lines(kind, child, cancel.clone(), on_line));

        Ok(Self { cancel, reader })
    }

    async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.reader
            .await
            .context("observer reader task failed to join")
    }
}

async fn read_lines<F>(kind: ObserverKind, mut child: Child, cancel: CancellationToken, mut on_line: F)
where
    F: FnMut(String) + Send + 'static,
{
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => on_line(line),
                    Ok(None) => {
                        info!("{} observer process closed its output", kind);
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read {} observer output: {}", kind, e);
                        break;
                    }
                },
            }
        }
    }

    if let Err(e) = child.kill().await {
        debug!("{} observer process already gone: {}", kind, e);
    }
}

fn lock_err<T>(_: T) -> anyhow::Error {
    anyhow!("observer state lock poisoned")
}

/// Collects transcript lines printed by a streaming speech-to-text command.
pub struct CommandTranscriptObserver {
    command: String,
    lines: Arc<Mutex<Vec<String>>>,
    process: Mutex<Option<SupervisedProcess>>,
}

impl CommandTranscriptObserver {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            lines: Arc::new(Mutex::new(Vec::new())),
            process: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TranscriptObserver for CommandTranscriptObserver {
    async fn start(&self) -> Result<()> {
        let mut process = self.process.lock().map_err(lock_err)?;
        if process.is_some() {
            bail!("transcript observer already running");
        }

        self.lines.lock().map_err(lock_err)?.clear();

        let lines = Arc::clone(&self.lines);
        *process = Some(SupervisedProcess::spawn(
            ObserverKind::Transcript,
            &self.command,
            move |line| {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line);
                }
            },
        )?);

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let process = self.process.lock().map_err(lock_err)?.take();
        match process {
            Some(process) => process.shutdown().await,
            None => Ok(()),
        }
    }

    fn current_text(&self) -> String {
        self.lines
            .lock()
            .map(|lines| join_transcript(&lines))
            .unwrap_or_default()
    }
}

/// Join non-blank transcript lines with single spaces.
fn join_transcript(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tracks the latest metrics object printed by an emotion-analysis command.
pub struct CommandEmotionObserver {
    command: String,
    latest: Arc<Mutex<SessionMetrics>>,
    process: Mutex<Option<SupervisedProcess>>,
}

impl CommandEmotionObserver {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            latest: Arc::new(Mutex::new(SessionMetrics::default())),
            process: Mutex::new(None),
        }
    }
}

#[async_trait]
impl EmotionObserver for CommandEmotionObserver {
    async fn start(&self) -> Result<bool> {
        let mut process = self.process.lock().map_err(lock_err)?;
        if process.is_some() {
            return Ok(false);
        }

        *self.latest.lock().map_err(lock_err)? = SessionMetrics::default();

        let latest = Arc::clone(&self.latest);
        *process = Some(SupervisedProcess::spawn(
            ObserverKind::Emotion,
            &self.command,
            move |line| match parse_metrics(&line) {
                Some(metrics) => {
                    if let Ok(mut latest) = latest.lock() {
                        *latest = metrics;
                    }
                }
                None => debug!("Skipping unparseable emotion output: {}", line),
            },
        )?);

        Ok(true)
    }

    async fn stop(&self) -> Result<()> {
        let process = self.process.lock().map_err(lock_err)?.take();
        match process {
            Some(process) => process.shutdown().await,
            None => Ok(()),
        }
    }

    fn current_metrics(&self) -> SessionMetrics {
        self.latest
            .lock()
            .map(|latest| *latest)
            .unwrap_or_default()
    }
}

fn parse_metrics(line: &str) -> Option<SessionMetrics> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    serde_json::from_str::<SessionMetrics>(line)
        .ok()
        .map(SessionMetrics::clamped)
}

/// Builds command observers from the `[observers]` config section.
pub struct CommandObserverFactory {
    transcript_command: Option<String>,
    emotion_command: Option<String>,
}

impl CommandObserverFactory {
    pub fn new(config: &ObserverConfig) -> Self {
        Self {
            transcript_command: non_blank(config.transcript_command.as_deref()),
            emotion_command: non_blank(config.emotion_command.as_deref()),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl ObserverFactory for CommandObserverFactory {
    fn transcript(&self) -> Result<Arc<dyn TranscriptObserver>> {
        match &self.transcript_command {
            Some(command) => Ok(Arc::new(CommandTranscriptObserver::new(command.clone()))),
            None => bail!("observers.transcript_command is not configured"),
        }
    }

    fn emotion(&self) -> Result<Arc<dyn EmotionObserver>> {
        match &self.emotion_command {
            Some(command) => Ok(Arc::new(CommandEmotionObserver::new(command.clone()))),
            None => bail!("observers.emotion_command is not configured"),
        }
    }
}
