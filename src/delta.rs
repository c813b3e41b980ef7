//! C3: turns per-run cumulative-or-incremental text chunks into the
//! incremental deltas the client actually wants to render.

use std::collections::HashMap;

/// Tracks, per upstream model run, the last accumulated string so it can
/// tell whether the next chunk is a cumulative extension, a fresh
/// increment, or a duplicate.
#[derive(Debug, Default)]
pub struct DeltaComputer {
    accumulated: HashMap<String, String>,
}

impl DeltaComputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the accumulated text for `run_id`. Called on a stream-start
    /// event so a new run never inherits a previous run's accumulator.
    pub fn reset(&mut self, run_id: &str) {
        self.accumulated.insert(run_id.to_string(), String::new());
    }

    /// Computes the delta to emit for `text` arriving on `run_id`, updating
    /// internal state. Returns `None` when nothing should be emitted
    /// (duplicate or empty chunk).
    ///
    /// Operates on `char` boundaries throughout so multi-byte UTF-8 text
    /// is never sliced mid-code-point.
    pub fn compute(&mut self, run_id: &str, text: &str) -> Option<String> {
        if text.is_empty() {
            return None;
        }

        let accumulated = self
            .accumulated
            .entry(run_id.to_string())
            .or_insert_with(String::new);

        let acc_len = accumulated.chars().count();
        let text_len = text.chars().count();

        if text_len > acc_len && text.starts_with(accumulated.as_str()) {
            let delta: String = text.chars().skip(acc_len).collect();
            *accumulated = text.to_string();
            Some(delta)
        } else if text_len > acc_len {
            accumulated.push_str(text);
            Some(text.to_string())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cumulative_chunks_yield_incremental_deltas() {
        let mut computer = DeltaComputer::new();
        assert_eq!(computer.compute("r1", "I"), Some("I".to_string()));
        assert_eq!(computer.compute("r1", "I am"), Some(" am".to_string()));
        assert_eq!(
            computer.compute("r1", "I am ready"),
            Some(" ready".to_string())
        );
    }

    #[test]
    fn non_prefix_chunk_is_treated_as_fresh_increment() {
        let mut computer = DeltaComputer::new();
        computer.compute("r1", "Hello");
        // Upstream switched to incremental mode mid-run.
        assert_eq!(computer.compute("r1", " world"), Some(" world".to_string()));
    }

    #[test]
    fn duplicate_or_shorter_chunk_emits_nothing() {
        let mut computer = DeltaComputer::new();
        computer.compute("r1", "Hello there");
        assert_eq!(computer.compute("r1", "Hello"), None);
        assert_eq!(computer.compute("r1", "Hello there"), None);
    }

    #[test]
    fn reset_clears_accumulator_for_a_new_run() {
        let mut computer = DeltaComputer::new();
        computer.compute("r1", "Hello");
        computer.reset("r1");
        assert_eq!(computer.compute("r1", "Hi"), Some("Hi".to_string()));
    }

    #[test]
    fn separate_runs_do_not_share_accumulators() {
        let mut computer = DeltaComputer::new();
        computer.compute("r1", "foo");
        assert_eq!(computer.compute("r2", "bar"), Some("bar".to_string()));
    }

    #[test]
    fn multi_byte_text_is_sliced_on_char_boundaries() {
        let mut computer = DeltaComputer::new();
        assert_eq!(computer.compute("r1", "caf\u{e9}"), Some("caf\u{e9}".to_string()));
        assert_eq!(
            computer.compute("r1", "caf\u{e9} \u{2615}"),
            Some(" \u{2615}".to_string())
        );
    }
}
