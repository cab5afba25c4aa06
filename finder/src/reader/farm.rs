//! Extractive BERT reader on candle.
//!
//! Loads a `BertForQuestionAnswering` checkpoint (encoder + `qa_outputs` span
//! head) either from a local directory or from the Hugging Face hub, slides
//! windows over each passage and decodes the best start/end spans.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::api::sync::Api;
use tokenizers::{
    Tokenizer,
    models::wordpiece::WordPiece,
    normalizers::{NormalizerWrapper, bert::BertNormalizer},
    pre_tokenizers::{PreTokenizerWrapper, bert::BertPreTokenizer},
};
use tracing::{debug, info, trace, warn};

use crate::{
    errors::FinderError,
    reader::{
        Reader, ReaderConfig,
        spans::{
            EncodedBatch, EncodedPassage, SpecialTokens, Window, build_batch, collect_answers,
            decode_window, plan_windows,
        },
    },
    types::{Answer, Passage},
};

enum Weights {
    Safetensors(PathBuf),
    Pth(PathBuf),
}

enum TokenizerSource {
    Json(PathBuf),
    /// WordPiece vocab for checkpoints that ship no `tokenizer.json`.
    Vocab { path: PathBuf, lowercase: bool },
}

struct ModelFiles {
    config: PathBuf,
    tokenizer: TokenizerSource,
    weights: Weights,
}

/// Resolves model files from a local directory, or downloads them from the hub.
fn resolve_files(model: &str) -> Result<ModelFiles, FinderError> {
    let local = Path::new(model);
    if local.is_dir() {
        debug!("FarmReader: loading local model from {}", local.display());
        let fetch = |name: &str| -> Result<Option<PathBuf>, FinderError> {
            let p = local.join(name);
            Ok(p.is_file().then_some(p))
        };
        return assemble(model, fetch, |name| {
            FinderError::Config(format!("{name} not found in {}", local.display()))
        });
    }

    info!("FarmReader: fetching '{model}' from the Hugging Face hub");
    let api = Api::new().map_err(|e| FinderError::Hub(e.to_string()))?;
    let repo = api.model(model.to_string());

    // Fallback files are only used when the repo listing confirms the
    // preferred file does not exist; download failures are reported as is.
    let listed: HashSet<String> = repo
        .info()
        .map_err(|e| FinderError::Hub(format!("listing '{model}': {e}")))?
        .siblings
        .into_iter()
        .map(|s| s.rfilename)
        .collect();

    assemble(
        model,
        |name| {
            if !listed.contains(name) {
                return Ok(None);
            }
            repo.get(name)
                .map(Some)
                .map_err(|e| FinderError::Hub(format!("downloading {name} of '{model}': {e}")))
        },
        |name| FinderError::Hub(format!("{name} not available for '{model}'")),
    )
}

/// Picks config, tokenizer and weights. `fetch` yields `Ok(None)` only for
/// files known to be absent.
fn assemble(
    model: &str,
    fetch: impl Fn(&str) -> Result<Option<PathBuf>, FinderError>,
    missing: impl Fn(&str) -> FinderError,
) -> Result<ModelFiles, FinderError> {
    let config = fetch("config.json")?.ok_or_else(|| missing("config.json"))?;

    let tokenizer = match fetch("tokenizer.json")? {
        Some(p) => TokenizerSource::Json(p),
        None => {
            let path = fetch("vocab.txt")?.ok_or_else(|| missing("tokenizer.json or vocab.txt"))?;
            let lowercase = fetch("tokenizer_config.json")?
                .and_then(|p| std::fs::read_to_string(p).ok())
                .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
                .and_then(|v| v.get("do_lower_case").and_then(|b| b.as_bool()))
                .unwrap_or_else(|| model.contains("uncased"));
            TokenizerSource::Vocab { path, lowercase }
        }
    };

    let weights = match fetch("model.safetensors")? {
        Some(p) => Weights::Safetensors(p),
        None => Weights::Pth(
            fetch("pytorch_model.bin")?
                .ok_or_else(|| missing("model.safetensors or pytorch_model.bin"))?,
        ),
    };

    Ok(ModelFiles {
        config,
        tokenizer,
        weights,
    })
}

fn load_tokenizer(source: &TokenizerSource) -> Result<Tokenizer, FinderError> {
    let mut tokenizer = match source {
        TokenizerSource::Json(p) => {
            Tokenizer::from_file(p).map_err(|e| FinderError::Tokenizer(e.to_string()))?
        }
        TokenizerSource::Vocab { path, lowercase } => {
            let vocab = path.to_string_lossy();
            let wordpiece = WordPiece::from_file(&vocab)
                .unk_token("[UNK]".to_string())
                .build()
                .map_err(|e| FinderError::Tokenizer(e.to_string()))?;
            let mut t = Tokenizer::new(wordpiece);
            t.with_normalizer(NormalizerWrapper::from(BertNormalizer::new(
                true, true, None, *lowercase,
            )));
            t.with_pre_tokenizer(PreTokenizerWrapper::from(BertPreTokenizer));
            t
        }
    };

    // Windows are built by hand; the tokenizer must return full sequences.
    tokenizer
        .with_truncation(None)
        .map_err(|e| FinderError::Tokenizer(e.to_string()))?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

/// BERT reader with a linear start/end span head.
pub struct FarmReader {
    model: BertModel,
    qa_outputs: Linear,
    tokenizer: Tokenizer,
    device: Device,
    cfg: ReaderConfig,
    special: SpecialTokens,
}

impl FarmReader {
    /// Loads the model described by `cfg`.
    ///
    /// # Errors
    /// Returns config, hub, tokenizer or model errors.
    pub fn load(cfg: ReaderConfig) -> Result<Self, FinderError> {
        cfg.validate()?;

        let device = if cfg.use_gpu {
            let device = Device::cuda_if_available(0)?;
            if !device.is_cuda() {
                warn!("FarmReader: GPU requested but CUDA is unavailable, using CPU");
            }
            device
        } else {
            Device::Cpu
        };

        let files = resolve_files(&cfg.model)?;
        let config: Config = serde_json::from_str(&std::fs::read_to_string(&files.config)?)?;
        let tokenizer = load_tokenizer(&files.tokenizer)?;

        let token = |t: &str| {
            tokenizer
                .token_to_id(t)
                .ok_or_else(|| FinderError::Tokenizer(format!("vocabulary has no {t} token")))
        };
        let special = SpecialTokens {
            cls: token("[CLS]")?,
            sep: token("[SEP]")?,
            pad: token("[PAD]")?,
        };

        let vb = match &files.weights {
            // SAFETY: the weights file is not modified while mapped.
            Weights::Safetensors(p) => unsafe {
                VarBuilder::from_mmaped_safetensors(&[p], DType::F32, &device)?
            },
            Weights::Pth(p) => VarBuilder::from_pth(p, DType::F32, &device)?,
        };

        let model = BertModel::load(vb.pp("bert"), &config)?;
        let qa_outputs = candle_nn::linear(config.hidden_size, 2, vb.pp("qa_outputs"))?;

        info!(
            "FarmReader: loaded '{}' (layers={}, batch_size={}, device={:?})",
            cfg.model, config.num_hidden_layers, cfg.batch_size, device
        );

        Ok(Self {
            model,
            qa_outputs,
            tokenizer,
            device,
            cfg,
            special,
        })
    }

    fn encode_passage(&self, text: &str) -> Result<EncodedPassage, FinderError> {
        let enc = self
            .tokenizer
            .encode_char_offsets(text, false)
            .map_err(|e| FinderError::Tokenizer(e.to_string()))?;
        Ok(EncodedPassage {
            ids: enc.get_ids().to_vec(),
            offsets: enc.get_offsets().to_vec(),
        })
    }

    /// Runs one batch of windows and returns per-window `(start, end)` logits.
    fn forward_batch(
        &self,
        question: &[u32],
        windows: &[Window],
        passages: &[EncodedPassage],
    ) -> Result<Vec<(Vec<f32>, Vec<f32>)>, FinderError> {
        let EncodedBatch {
            rows,
            seq_len,
            ids,
            types,
            mask,
        } = build_batch(question, windows, passages, self.special);

        let ids = Tensor::from_vec(ids, (rows, seq_len), &self.device)?;
        let types = Tensor::from_vec(types, (rows, seq_len), &self.device)?;
        let mask = Tensor::from_vec(mask, (rows, seq_len), &self.device)?;

        let hidden = self.model.forward(&ids, &types, Some(&mask))?;
        let logits = self.qa_outputs.forward(&hidden)?;
        let start = logits.i((.., .., 0))?.contiguous()?.to_vec2::<f32>()?;
        let end = logits.i((.., .., 1))?.contiguous()?.to_vec2::<f32>()?;

        Ok(start.into_iter().zip(end).collect())
    }
}

impl Reader for FarmReader {
    fn predict(
        &self,
        question: &str,
        passages: &[Passage],
        top_k: usize,
    ) -> Result<Vec<Answer>, FinderError> {
        if passages.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut q_ids = self
            .tokenizer
            .encode(question, false)
            .map_err(|e| FinderError::Tokenizer(e.to_string()))?
            .get_ids()
            .to_vec();
        q_ids.truncate(self.cfg.max_query_len);

        let budget = self.cfg.max_seq_len - q_ids.len() - 3;
        let q_part = q_ids.len() + 2;

        let encoded = passages
            .iter()
            .map(|p| self.encode_passage(&p.text))
            .collect::<Result<Vec<_>, _>>()?;

        let windows = plan_windows(&encoded, budget, self.cfg.doc_stride);

        debug!(
            "FarmReader::predict passages={} windows={} q_tokens={}",
            passages.len(),
            windows.len(),
            q_ids.len()
        );

        let mut raw = Vec::new();
        for chunk in windows.chunks(self.cfg.batch_size) {
            let logits = self.forward_batch(&q_ids, chunk, &encoded)?;
            for (w, (start, end)) in chunk.iter().zip(logits) {
                raw.extend(decode_window(
                    w,
                    q_part,
                    &start,
                    &end,
                    &encoded[w.passage].offsets,
                    self.cfg.max_answer_len,
                    self.cfg.top_k_per_candidate,
                ));
            }
        }

        trace!("FarmReader::predict raw spans={}", raw.len());
        Ok(collect_answers(
            raw,
            passages,
            top_k,
            self.cfg.context_window_size,
        ))
    }
}
