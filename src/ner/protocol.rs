//! Wire protocol between the parent process and the entity worker.
//!
//! One task goes down the worker's stdin, one reply comes back on its stdout.
//! The channel is single-use: the worker exits after writing its reply.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Task handed to the entity worker on stdin, as a single JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerTask {
    /// Document text to run entity recognition over.
    pub text: String,
    /// Directory holding the ONNX model and tokenizer files.
    pub model_dir: PathBuf,
    /// Merge wordpieces and adjacent tags into whole entity mentions.
    pub merge_tokens: bool,
}

/// Reply written by the entity worker to stdout, as a single JSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkerReply {
    /// Prediction completed; entities are already deduplicated.
    Ok {
        /// Deduplicated entity mentions found in the document.
        entities: Vec<String>,
    },
    /// Prediction failed inside the worker.
    Error {
        /// Human-readable cause, forwarded to the caller.
        message: String,
    },
}
