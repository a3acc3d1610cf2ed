//! Append-only construction trajectory, owned per-tree by its
//! orchestrator and flushed to the sink at tree completion.

use chrono::Utc;

use crate::types::{GenerationMethod, TrajectoryEntry, ValidationResults};

/// Records every acceptance and rejection during a single tree's
/// construction, for debugging, reward shaping, and downstream audit.
#[derive(Debug, Default)]
pub struct TrajectoryRecorder {
    entries: Vec<TrajectoryEntry>,
}

impl TrajectoryRecorder {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &mut self,
        step: impl Into<String>,
        layer: u8,
        generation_method: GenerationMethod,
        parent_question: Option<String>,
        parent_answer: Option<String>,
        current_question: Option<String>,
        current_answer: Option<String>,
        validation_results: ValidationResults,
        api_call_count: u32,
        elapsed_ms: u64,
        error: Option<String>,
    ) {
        self.entries.push(TrajectoryEntry {
            step: step.into(),
            layer,
            parent_question,
            parent_answer,
            parent_keywords: None,
            current_question,
            current_answer,
            keywords: None,
            validation_results,
            keyword_necessity_scores: None,
            generation_method,
            api_call_count,
            elapsed_ms,
            timestamp: Utc::now(),
            error,
        });
    }

    pub fn into_entries(self) -> Vec<TrajectoryEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_appends_entry() {
        let mut recorder = TrajectoryRecorder::new();
        recorder.record(
            "S1",
            0,
            GenerationMethod::Root,
            None,
            None,
            Some("What year?".to_string()),
            Some("1957".to_string()),
            ValidationResults::default(),
            1,
            120,
            None,
        );
        assert_eq!(recorder.len(), 1);
        let entries = recorder.into_entries();
        assert_eq!(entries[0].step, "S1");
    }

    #[test]
    fn test_new_recorder_is_empty() {
        let recorder = TrajectoryRecorder::new();
        assert!(recorder.is_empty());
    }
}
