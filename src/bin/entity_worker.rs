//! Disposable entity-recognition worker.
//!
//! Reads one JSON task from stdin, writes one JSON reply to stdout, and exits.
//! This process exists to contain two process-wide globals the predictor stack
//! needs: the `TOKENIZERS_PARALLELISM` environment toggle and the ONNX Runtime
//! environment. Both die with the process; the parent stays clean.

use std::collections::BTreeSet;
use std::io::Read;

use anyhow::{Context, Result};
use eznlp::ner::predictor::EntityPredictor;
use eznlp::ner::protocol::{WorkerReply, WorkerTask};

fn main() {
    // Diagnostics go to stderr; stdout carries exactly one reply line.
    let _log_guard = eznlp::logging::init_tracing();
    let reply = match run() {
        Ok(entities) => WorkerReply::Ok { entities },
        Err(error) => WorkerReply::Error {
            message: format!("{error:#}"),
        },
    };
    let failed = matches!(reply, WorkerReply::Error { .. });
    let encoded = serde_json::to_string(&reply)
        .unwrap_or_else(|_| r#"{"status":"error","message":"reply encoding failed"}"#.to_string());
    println!("{encoded}");
    if failed {
        std::process::exit(1);
    }
}

fn run() -> Result<Vec<String>> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("failed to read task from stdin")?;
    let task: WorkerTask = serde_json::from_str(&raw).context("failed to decode task")?;

    // Nothing to tag; skip model loading entirely.
    if task.text.trim().is_empty() {
        return Ok(Vec::new());
    }

    // SAFETY: still single-threaded here, and containing this process-wide
    // mutation is the reason this worker exists.
    unsafe {
        std::env::set_var("TOKENIZERS_PARALLELISM", "0");
    }
    // `commit()` is infallible in this ort version; `false` only signals an
    // already-configured environment, which is not an error here.
    ort::init().with_name("eznlp-entity-worker").commit();

    let mut predictor = EntityPredictor::load(&task.model_dir)?;
    let entities = predictor.predict(&task.text, task.merge_tokens)?;

    let deduplicated: BTreeSet<String> = entities.into_iter().collect();
    Ok(deduplicated.into_iter().collect())
}
