//! Local ONNX entity predictor, executed inside the entity worker.
//!
//! Runs a CoNLL-style token-classification model (e.g. an ONNX export of
//! dslim/bert-base-NER) entirely on the local CPU. Wordpieces and adjacent
//! BIO tags are merged back into whole entity mentions, mirroring the
//! `merge_tokens` behavior of the upstream predictors this crate delegates to.
//!
//! Expects `model.onnx` and `tokenizer.json` in the model directory.

use std::path::Path;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::debug;

/// BIO labels output by the model, in the order the model returns them
/// (dslim/bert-base-NER id2label ordering).
const LABEL_ORDER: [&str; 9] = [
    "O", "B-MISC", "I-MISC", "B-PER", "I-PER", "B-ORG", "I-ORG", "B-LOC", "I-LOC",
];

/// Token-classification predictor holding the model session and tokenizer.
pub struct EntityPredictor {
    session: Session,
    tokenizer: Tokenizer,
}

/// One tokenizer output token with the BIO tag the model assigned to it.
#[derive(Debug, Clone)]
struct TaggedToken {
    tag: &'static str,
    text: String,
}

impl TaggedToken {
    fn is_subword(&self) -> bool {
        self.text.starts_with("##")
    }
}

impl EntityPredictor {
    /// Load the ONNX model and tokenizer from the given directory.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            anyhow::bail!("Model file not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

        debug!("Loaded entity model from {}", model_dir.display());

        Ok(Self { session, tokenizer })
    }

    /// Predict the entity mentions in `text`.
    ///
    /// With `merge_tokens` set, wordpieces and adjacent same-type tags are
    /// joined into whole mentions; otherwise every tagged token is reported on
    /// its own. The output may contain duplicates — the worker deduplicates.
    pub fn predict(&mut self, text: &str, merge_tokens: bool) -> Result<Vec<String>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let seq_len = encoding.get_ids().len();
        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| i64::from(m))
            .collect();
        let token_type_ids: Vec<i64> = encoding
            .get_type_ids()
            .iter()
            .map(|&t| i64::from(t))
            .collect();

        let shape = [1_i64, seq_len as i64];
        let input_ids_tensor =
            Tensor::from_array((shape, input_ids)).context("Failed to create input_ids tensor")?;
        let attention_mask_tensor = Tensor::from_array((shape, attention_mask))
            .context("Failed to create attention_mask tensor")?;
        let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids))
            .context("Failed to create token_type_ids tensor")?;

        // Output shape: [1, seq_len, 9] — raw logits per token.
        let logits = {
            let outputs = self
                .session
                .run(ort::inputs! {
                    "input_ids" => input_ids_tensor,
                    "attention_mask" => attention_mask_tensor,
                    "token_type_ids" => token_type_ids_tensor
                })
                .context("ONNX inference failed")?;

            let (_out_shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .context("Failed to extract output tensor")?;

            data.to_vec()
        };

        let special = encoding.get_special_tokens_mask();
        let tokens = encoding.get_tokens();

        let mut tagged = Vec::with_capacity(seq_len);
        for position in 0..seq_len {
            if special.get(position).copied().unwrap_or(0) == 1 {
                continue;
            }
            let row = &logits[position * LABEL_ORDER.len()..(position + 1) * LABEL_ORDER.len()];
            tagged.push(TaggedToken {
                tag: LABEL_ORDER[argmax(row)],
                text: tokens[position].clone(),
            });
        }

        let entities = if merge_tokens {
            merge_entities(&tagged)
        } else {
            tagged
                .into_iter()
                .filter(|token| token.tag != "O")
                .map(|token| token.text.trim_start_matches("##").to_string())
                .collect()
        };

        debug!(entities = entities.len(), "Predicted entities");
        Ok(entities)
    }
}

/// Index of the largest logit in a row.
fn argmax(row: &[f32]) -> usize {
    let mut best = 0;
    for (index, value) in row.iter().enumerate() {
        if *value > row[best] {
            best = index;
        }
    }
    best
}

/// Split a BIO tag into its boundary marker and entity type.
fn parse_tag(tag: &str) -> Option<(bool, &str)> {
    match tag.split_once('-') {
        Some(("B", entity_type)) => Some((true, entity_type)),
        Some(("I", entity_type)) => Some((false, entity_type)),
        _ => None,
    }
}

/// Join wordpieces and adjacent same-type tags into whole entity mentions.
fn merge_entities(tokens: &[TaggedToken]) -> Vec<String> {
    let mut entities = Vec::new();
    let mut current: Option<(String, String)> = None;

    for token in tokens {
        match parse_tag(token.tag) {
            None => {
                if let Some((_, text)) = current.take() {
                    entities.push(text);
                }
            }
            Some((begins, entity_type)) => {
                let continues = match &current {
                    // Subword pieces always extend the mention they belong to.
                    Some((current_type, _)) => {
                        current_type == entity_type && (!begins || token.is_subword())
                    }
                    None => false,
                };
                if continues {
                    if let Some((_, text)) = current.as_mut() {
                        if token.is_subword() {
                            text.push_str(token.text.trim_start_matches("##"));
                        } else {
                            text.push(' ');
                            text.push_str(&token.text);
                        }
                    }
                } else {
                    if let Some((_, text)) = current.take() {
                        entities.push(text);
                    }
                    current = Some((
                        entity_type.to_string(),
                        token.text.trim_start_matches("##").to_string(),
                    ));
                }
            }
        }
    }

    if let Some((_, text)) = current {
        entities.push(text);
    }
    entities
}
