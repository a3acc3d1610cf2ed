//! Short-answer extraction: finds objective, uniquely-predicated
//! spans in a document that can anchor a reasoning tree.

use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::document::Document;
use crate::error::{BuilderError, BuilderResult};
use crate::types::{AnswerKind, ShortAnswer};

const CONTEXT_RADIUS_CHARS: usize = 120;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d[\d,]*(?:\.\d+)?\b").unwrap());
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d{1,2}\s+)?(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{4}\b|\b\d{4}\b").unwrap()
});
static PROPER_NOUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-zA-Z]*(?:\s+[A-Z][a-zA-Z0-9]*)*\b").unwrap());
static TECHNICAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2,}(?:-?\d+)?\b|\b[a-zA-Z]+-\d+\b").unwrap());
static SUBJECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bi believe\b|\bit is said\b|\bsome argue\b|\bin my opinion\b|\ballegedly\b|\bit seems\b")
        .unwrap()
});

const STOPWORDS_PROPER: &[&str] = &["The", "A", "An", "This", "That", "These", "Those", "It", "In", "On", "At"];

/// A candidate span before scoring, paired with the sentence it came from.
struct Candidate<'a> {
    text: &'a str,
    kind: AnswerKind,
    char_offset: usize,
    sentence: &'a str,
    sentence_offset: usize,
}

/// Extracts short, objective, uniquely-determined answer spans from a document.
#[derive(Debug, Default)]
pub struct ShortAnswerExtractor {
    pub top_k: usize,
}

impl ShortAnswerExtractor {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Extract up to `top_k` ranked `ShortAnswer`s from `document`.
    pub fn extract(&self, document: &Document) -> BuilderResult<Vec<ShortAnswer>> {
        let sentences = split_sentences(&document.content);

        let mut candidates = Vec::new();
        for (sentence, sentence_offset) in &sentences {
            if SUBJECTIVE_RE.is_match(sentence) {
                continue;
            }
            candidates.extend(find_candidates(sentence, *sentence_offset));
        }

        if candidates.is_empty() {
            return Err(BuilderError::NoAnchorFound {
                doc_id: document.doc_id.clone(),
            });
        }

        let mut scored: Vec<(f64, Candidate<'_>)> = candidates
            .into_iter()
            .map(|c| (score_candidate(&c, &document.content), c))
            .collect();

        // Rank by score descending, tie-break by character offset ascending.
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.char_offset.cmp(&b.1.char_offset))
        });

        let mut seen = std::collections::HashSet::new();
        let mut answers = Vec::new();
        for (score, candidate) in scored {
            if !seen.insert(candidate.text.to_string()) {
                continue;
            }
            answers.push(ShortAnswer {
                text: candidate.text.to_string(),
                kind: candidate.kind,
                char_offset: candidate.char_offset,
                context_window: context_window(&document.content, candidate.char_offset, candidate.text.len()),
                confidence: score,
            });
            if answers.len() >= self.top_k.max(1) {
                break;
            }
        }

        if answers.is_empty() {
            return Err(BuilderError::NoAnchorFound {
                doc_id: document.doc_id.clone(),
            });
        }

        Ok(answers)
    }
}

fn split_sentences(text: &str) -> Vec<(&str, usize)> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let end = i + c.len_utf8();
            let slice = text[start..end].trim();
            if !slice.is_empty() {
                let offset = start + text[start..end].find(slice.chars().next().unwrap_or(' ')).unwrap_or(0);
                sentences.push((slice, offset));
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push((tail, start));
    }
    sentences
}

fn find_candidates(sentence: &str, sentence_offset: usize) -> Vec<Candidate<'_>> {
    let mut out = Vec::new();
    for m in DATE_RE.find_iter(sentence) {
        out.push(Candidate {
            text: m.as_str(),
            kind: AnswerKind::Date,
            char_offset: sentence_offset + m.start(),
            sentence,
            sentence_offset,
        });
    }
    for m in NUMBER_RE.find_iter(sentence) {
        if DATE_RE.is_match(m.as_str()) {
            continue;
        }
        out.push(Candidate {
            text: m.as_str(),
            kind: AnswerKind::Number,
            char_offset: sentence_offset + m.start(),
            sentence,
            sentence_offset,
        });
    }
    for m in TECHNICAL_RE.find_iter(sentence) {
        out.push(Candidate {
            text: m.as_str(),
            kind: AnswerKind::Technical,
            char_offset: sentence_offset + m.start(),
            sentence,
            sentence_offset,
        });
    }
    for m in PROPER_NOUN_RE.find_iter(sentence) {
        if STOPWORDS_PROPER.contains(&m.as_str()) {
            continue;
        }
        out.push(Candidate {
            text: m.as_str(),
            kind: AnswerKind::Name,
            char_offset: sentence_offset + m.start(),
            sentence,
            sentence_offset,
        });
    }
    out
}

fn score_candidate(candidate: &Candidate<'_>, full_text: &str) -> f64 {
    let specificity = specificity_score(candidate.text, full_text);
    let distinctiveness = distinctiveness_score(candidate.sentence, candidate.text);
    let objectivity = if SUBJECTIVE_RE.is_match(candidate.sentence) { 0.0 } else { 1.0 };

    // Weighted blend; objectivity is a near-hard gate (already filtered at the
    // sentence level, but individual spans inside an otherwise neutral
    // sentence can still sit next to a hedge word).
    0.4 * specificity + 0.4 * distinctiveness + 0.2 * objectivity
}

fn specificity_score(span: &str, full_text: &str) -> f64 {
    let occurrences = full_text.matches(span).count().max(1);
    let rarity = 1.0 / occurrences as f64;
    let length_bonus = (span.graphemes(true).count() as f64 / 20.0).min(1.0);
    (rarity * 0.7 + length_bonus * 0.3).min(1.0)
}

fn distinctiveness_score(sentence: &str, span: &str) -> f64 {
    let word_count = sentence.split_whitespace().count().max(1);
    // A shorter, more tightly-predicated sentence around the span counts as
    // more distinctive than a long, diffuse one.
    let length_penalty = (1.0 - (word_count as f64 / 40.0)).clamp(0.2, 1.0);
    let position_bonus = if sentence.starts_with(span) { 0.1 } else { 0.0 };
    (length_penalty + position_bonus).min(1.0)
}

fn context_window(full_text: &str, char_offset: usize, span_len: usize) -> String {
    let start = char_offset.saturating_sub(CONTEXT_RADIUS_CHARS);
    let end = (char_offset + span_len + CONTEXT_RADIUS_CHARS).min(full_text.len());
    let start = floor_char_boundary(full_text, start);
    let end = ceil_char_boundary(full_text, end);
    full_text[start..end].trim().to_string()
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
