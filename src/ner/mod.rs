//! Named-entity recognition behind a disposable worker process.
//!
//! The predictor stack sets process-wide globals before it can run: the
//! `TOKENIZERS_PARALLELISM` environment toggle consulted by the tokenizers
//! crate, and the process-global ONNX Runtime environment. Neither can be
//! unwound once set, so each prediction runs in its own short-lived
//! `entity-worker` process and the globals die with it. The parent never
//! mutates its own environment.
//!
//! Unlike a bare join-and-read handoff, the wait here is bounded: a stuck
//! worker is killed at the deadline and reported as [`NerError::Timeout`], and
//! a crashed worker surfaces as [`NerError::WorkerFailed`] with its cause.

/// ONNX token-classification predictor executed inside the worker.
pub mod predictor;
/// Parent/worker wire protocol types.
pub mod protocol;

use crate::config::get_config;
use crate::ner::protocol::{WorkerReply, WorkerTask};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Name of the worker executable shipped alongside this crate's binaries.
const WORKER_BIN_NAME: &str = "entity-worker";

/// Errors surfaced by the isolated entity-recognition runner.
#[derive(Debug, Error)]
pub enum NerError {
    /// `NER_MODEL_DIR` was not configured and no explicit model dir was given.
    #[error("NER model directory is not configured (set NER_MODEL_DIR)")]
    ModelDirUnset,
    /// The worker executable could not be located.
    #[error("Could not locate the entity-worker executable: {0}")]
    WorkerBinMissing(String),
    /// The worker process could not be started.
    #[error("Failed to start entity worker {path}: {source}")]
    Spawn {
        /// Worker executable that failed to start.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The task could not be written to the worker's stdin.
    #[error("Failed to hand the task to the entity worker: {0}")]
    Handoff(#[source] std::io::Error),
    /// The worker did not finish within the configured deadline and was killed.
    #[error("Entity worker exceeded its {limit:?} deadline")]
    Timeout {
        /// Deadline that was exceeded.
        limit: Duration,
    },
    /// The worker reported a failure or exited without a usable reply.
    #[error("Entity worker failed: {0}")]
    WorkerFailed(String),
    /// The worker produced output that is not a valid reply.
    #[error("Unintelligible reply from entity worker: {0}")]
    Protocol(String),
}

/// Runs entity recognition in a disposable worker process, one per call.
///
/// Each invocation owns its own worker and its own stdin/stdout handoff;
/// concurrent calls never share state.
pub struct IsolatedNerRunner {
    worker_bin: PathBuf,
    model_dir: PathBuf,
    timeout: Duration,
}

impl IsolatedNerRunner {
    /// Build a runner from configuration.
    ///
    /// The worker executable is taken from `NER_WORKER_BIN` when set, and
    /// otherwise expected as a sibling of the current executable.
    pub fn new() -> Result<Self, NerError> {
        let config = get_config();
        let model_dir = config.ner_model_dir.clone().ok_or(NerError::ModelDirUnset)?;
        let worker_bin = match &config.ner_worker_bin {
            Some(path) => path.clone(),
            None => default_worker_bin()?,
        };
        Ok(Self {
            worker_bin,
            model_dir,
            timeout: Duration::from_secs(config.ner_worker_timeout_secs),
        })
    }

    /// Build a runner against an explicit worker executable and model directory.
    pub fn with_worker(worker_bin: PathBuf, model_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            worker_bin,
            model_dir,
            timeout,
        }
    }

    /// Identify the named entities (persons, places, organizations, ...) in `doc`.
    ///
    /// Blocks until the worker has produced a result and been torn down, or
    /// until the deadline kills it. The returned set carries no ordering
    /// guarantee beyond `BTreeSet`'s own; an empty document yields an empty
    /// set.
    pub async fn named_entities(&self, doc: &str) -> Result<BTreeSet<String>, NerError> {
        let task = WorkerTask {
            text: doc.to_string(),
            model_dir: self.model_dir.clone(),
            merge_tokens: true,
        };
        let encoded = serde_json::to_vec(&task)
            .map_err(|error| NerError::Protocol(format!("failed to encode task: {error}")))?;

        tracing::debug!(
            worker = %self.worker_bin.display(),
            chars = doc.len(),
            "Spawning entity worker"
        );

        let mut child = Command::new(&self.worker_bin)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the child on timeout must also reap the OS process.
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| NerError::Spawn {
                path: self.worker_bin.display().to_string(),
                source,
            })?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| NerError::Protocol("worker stdin unavailable".to_string()))?;
            stdin.write_all(&encoded).await.map_err(NerError::Handoff)?;
            stdin.shutdown().await.map_err(NerError::Handoff)?;
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|error| {
                NerError::WorkerFailed(format!("failed to collect worker output: {error}"))
            })?,
            Err(_elapsed) => {
                tracing::warn!(limit = ?self.timeout, "Entity worker timed out; killing it");
                return Err(NerError::Timeout { limit: self.timeout });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        match serde_json::from_str::<WorkerReply>(stdout.trim()) {
            Ok(WorkerReply::Ok { entities }) => {
                let set: BTreeSet<String> = entities.into_iter().collect();
                tracing::debug!(entities = set.len(), "Entity worker finished");
                Ok(set)
            }
            Ok(WorkerReply::Error { message }) => Err(NerError::WorkerFailed(message)),
            Err(_) if !output.status.success() => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(NerError::WorkerFailed(format!(
                    "worker exited with {} before replying: {}",
                    output.status,
                    stderr.trim()
                )))
            }
            Err(error) => Err(NerError::Protocol(format!(
                "undecodable worker reply ({error}): {:?}",
                stdout.trim()
            ))),
        }
    }
}

fn default_worker_bin() -> Result<PathBuf, NerError> {
    let exe = std::env::current_exe()
        .map_err(|error| NerError::WorkerBinMissing(error.to_string()))?;
    let candidate = exe
        .parent()
        .map(|dir| dir.join(WORKER_BIN_NAME))
        .ok_or_else(|| NerError::WorkerBinMissing("current executable has no parent".into()))?;
    if candidate.is_file() {
        Ok(candidate)
    } else {
        Err(NerError::WorkerBinMissing(format!(
            "{} not found next to {}",
            WORKER_BIN_NAME,
            exe.display()
        )))
    }
}
