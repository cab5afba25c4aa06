//! Span decoding and answer post-processing, independent of the model.

use std::{collections::HashSet, ops::Range};

use crate::types::{Answer, Passage};

/// Candidate span in sequence positions (both ends inclusive).
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SpanCandidate {
    pub start: usize,
    pub end: usize,
    pub score: f32,
}

/// Passage tokens with their character offsets.
#[derive(Clone, Debug, Default)]
pub(crate) struct EncodedPassage {
    pub ids: Vec<u32>,
    pub offsets: Vec<(usize, usize)>,
}

/// One model input: the passage tokens `tok_start..tok_end`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Window {
    pub passage: usize,
    pub tok_start: usize,
    pub tok_end: usize,
}

/// Vocabulary ids of the special tokens used to frame a window.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SpecialTokens {
    pub cls: u32,
    pub sep: u32,
    pub pad: u32,
}

/// Row-major `rows x seq_len` model inputs.
#[derive(Debug, PartialEq)]
pub(crate) struct EncodedBatch {
    pub rows: usize,
    pub seq_len: usize,
    pub ids: Vec<u32>,
    pub types: Vec<u32>,
    pub mask: Vec<u32>,
}

/// Answer span mapped back to character offsets of a passage.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RawSpan {
    pub passage: usize,
    pub char_start: usize,
    pub char_end: usize,
    pub score: f32,
}

/// Best `n` spans with `start <= end < start + max_answer_len`, both inside `range`.
///
/// Score is `start_logits[start] + end_logits[end]`.
pub(crate) fn top_spans(
    start_logits: &[f32],
    end_logits: &[f32],
    range: Range<usize>,
    max_answer_len: usize,
    n: usize,
) -> Vec<SpanCandidate> {
    let hi = range.end.min(start_logits.len()).min(end_logits.len());
    let mut spans = Vec::new();
    for start in range.start..hi {
        let last = (start + max_answer_len).min(hi);
        for end in start..last {
            spans.push(SpanCandidate {
                start,
                end,
                score: start_logits[start] + end_logits[end],
            });
        }
    }
    spans.sort_by(|a, b| b.score.total_cmp(&a.score));
    spans.truncate(n);
    spans
}

/// Window start offsets covering `len` tokens with windows of `budget` tokens.
pub(crate) fn window_starts(len: usize, budget: usize, stride: usize) -> Vec<usize> {
    if len == 0 || budget == 0 {
        return Vec::new();
    }
    let stride = stride.clamp(1, budget);
    let mut starts = vec![0];
    let mut start = 0;
    while start + budget < len {
        start += stride;
        starts.push(start);
    }
    starts
}

/// Cuts every passage into windows of at most `budget` tokens.
pub(crate) fn plan_windows(passages: &[EncodedPassage], budget: usize, stride: usize) -> Vec<Window> {
    passages
        .iter()
        .enumerate()
        .flat_map(|(passage, enc)| {
            let len = enc.ids.len();
            window_starts(len, budget, stride)
                .into_iter()
                .map(move |tok_start| Window {
                    passage,
                    tok_start,
                    tok_end: (tok_start + budget).min(len),
                })
        })
        .collect()
}

/// Lays out `[CLS] question [SEP] window [SEP]` rows, right-padded to the
/// longest row. Token types are 1 from the first passage token on; the mask
/// is 1 on real tokens only.
pub(crate) fn build_batch(
    question: &[u32],
    windows: &[Window],
    passages: &[EncodedPassage],
    special: SpecialTokens,
) -> EncodedBatch {
    let q_part = question.len() + 2;
    let seq_len = windows
        .iter()
        .map(|w| q_part + (w.tok_end - w.tok_start) + 1)
        .max()
        .unwrap_or(q_part + 1);
    let rows = windows.len();

    let mut ids = vec![special.pad; rows * seq_len];
    let mut types = vec![0u32; rows * seq_len];
    let mut mask = vec![0u32; rows * seq_len];

    for (row, w) in windows.iter().enumerate() {
        let mut seq = Vec::with_capacity(seq_len);
        seq.push(special.cls);
        seq.extend_from_slice(question);
        seq.push(special.sep);
        seq.extend_from_slice(&passages[w.passage].ids[w.tok_start..w.tok_end]);
        seq.push(special.sep);

        let base = row * seq_len;
        for (i, id) in seq.iter().enumerate() {
            ids[base + i] = *id;
            mask[base + i] = 1;
            if i >= q_part {
                types[base + i] = 1;
            }
        }
    }

    EncodedBatch {
        rows,
        seq_len,
        ids,
        types,
        mask,
    }
}

/// Best spans of one window mapped to passage character offsets.
///
/// `q_part` is the number of sequence positions before the first passage
/// token (`[CLS]`, question, `[SEP]`).
pub(crate) fn decode_window(
    window: &Window,
    q_part: usize,
    start_logits: &[f32],
    end_logits: &[f32],
    offsets: &[(usize, usize)],
    max_answer_len: usize,
    n: usize,
) -> Vec<RawSpan> {
    let range = q_part..q_part + (window.tok_end - window.tok_start);
    top_spans(start_logits, end_logits, range, max_answer_len, n)
        .into_iter()
        .map(|span| {
            let first = window.tok_start + (span.start - q_part);
            let last = window.tok_start + (span.end - q_part);
            RawSpan {
                passage: window.passage,
                char_start: offsets[first].0,
                char_end: offsets[last].1,
                score: span.score,
            }
        })
        .collect()
}

/// Character range of a `window`-sized context around `[start, end)`.
pub(crate) fn context_window(
    text_len: usize,
    start: usize,
    end: usize,
    window: usize,
) -> (usize, usize) {
    if text_len <= window {
        return (0, text_len);
    }
    let ans_len = end - start;
    if ans_len >= window {
        return (start, end);
    }
    let left = (window - ans_len) / 2;
    let cs = start.saturating_sub(left);
    let ce = (cs + window).min(text_len);
    (ce - window, ce)
}

/// Logistic squash of a span score, scaled like FARM's reader.
pub(crate) fn probability(score: f32) -> f32 {
    1.0 / (1.0 + (-score / 8.0).exp())
}

fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end - start).collect()
}

/// Ranks, dedups and truncates raw spans, then cuts context windows.
pub(crate) fn collect_answers(
    mut raw: Vec<RawSpan>,
    passages: &[Passage],
    top_k: usize,
    window: usize,
) -> Vec<Answer> {
    raw.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(top_k);
    for span in raw {
        if out.len() >= top_k {
            break;
        }
        if !seen.insert((span.passage, span.char_start, span.char_end)) {
            continue;
        }
        let Some(passage) = passages.get(span.passage) else {
            continue;
        };

        let answer = char_slice(&passage.text, span.char_start, span.char_end);
        if answer.trim().is_empty() {
            continue;
        }

        let text_len = passage.text.chars().count();
        let (cs, ce) = context_window(text_len, span.char_start, span.char_end, window);

        out.push(Answer {
            answer,
            score: Some(span.score),
            probability: Some(probability(span.score)),
            context: char_slice(&passage.text, cs, ce),
            offset_start: span.char_start - cs,
            offset_end: span.char_end - cs,
            document_id: passage.document_id.clone(),
        });
    }
    out
}
