//! Compiled, bucketed pattern tables backing the [`super::PatternRegistry`].

use std::collections::HashMap;

use crate::types::{CompiledPatternRecord, GroupMap, PatternKind};

/// A compiled pattern paired with its catalogue record.
struct Entry {
    regex: regex::Regex,
    record: CompiledPatternRecord,
}

/// The outcome of a successful pattern match.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Catalogue id of the pattern that matched.
    pub pattern_id: i64,
    /// Named capture groups from the match.
    pub groups: GroupMap,
    /// Framework hint carried by the pattern record, if any.
    pub framework_hint: Option<String>,
    /// Confidence to assign to evidence derived from this match.
    pub confidence: f64,
}

/// Snapshot of compiled patterns, bucketed and sorted by priority
/// descending. Immutable once built; reload swaps the whole table.
#[derive(Default)]
pub struct PatternTables {
    performance: Vec<Entry>,
    blacklist: Vec<Entry>,
    training_event: HashMap<String, Vec<Entry>>,
    checkpoint_event: HashMap<String, Vec<Entry>>,
    identify: Vec<Entry>,
}

impl PatternTables {
    /// Route a compiled regex into its bucket based on the record's kind.
    pub(super) fn insert(&mut self, regex: regex::Regex, record: CompiledPatternRecord) {
        let entry = Entry { regex, record };
        match entry.record.kind {
            PatternKind::Performance => self.performance.push(entry),
            PatternKind::Blacklist => self.blacklist.push(entry),
            PatternKind::TrainingEvent => {
                let subtype = entry.record.subtype.clone().unwrap_or_default();
                self.training_event.entry(subtype).or_default().push(entry);
            }
            PatternKind::CheckpointEvent => {
                let subtype = entry.record.subtype.clone().unwrap_or_default();
                self.checkpoint_event.entry(subtype).or_default().push(entry);
            }
            PatternKind::Identify => self.identify.push(entry),
        }
    }

    /// Sort every bucket by priority descending.
    pub(super) fn sort_by_priority(&mut self) {
        let by_priority = |a: &Entry, b: &Entry| b.record.priority.cmp(&a.record.priority);
        self.performance.sort_by(by_priority);
        self.blacklist.sort_by(by_priority);
        self.identify.sort_by(by_priority);
        for bucket in self.training_event.values_mut() {
            bucket.sort_by(by_priority);
        }
        for bucket in self.checkpoint_event.values_mut() {
            bucket.sort_by(by_priority);
        }
    }

    /// First matching performance pattern.
    #[must_use]
    pub fn match_performance(&self, line: &str) -> Option<MatchOutcome> {
        first_match(&self.performance, line)
    }

    /// Whether any blacklist pattern matches.
    #[must_use]
    pub fn is_blacklisted(&self, line: &str) -> bool {
        self.blacklist.iter().any(|e| e.regex.is_match(line))
    }

    /// First matching training-event pattern across all subtypes.
    #[must_use]
    pub fn match_training_event(&self, line: &str) -> Option<(String, MatchOutcome)> {
        match_keyed(&self.training_event, line)
    }

    /// First matching checkpoint-event pattern across all subtypes.
    #[must_use]
    pub fn match_checkpoint_event(&self, line: &str) -> Option<(String, MatchOutcome)> {
        match_keyed(&self.checkpoint_event, line)
    }

    /// Highest-confidence matching identify pattern.
    #[must_use]
    pub fn match_identify(&self, line: &str) -> Option<MatchOutcome> {
        // `identify` is already sorted by priority, but confidence is what
        // decides ties here, so scan the whole bucket.
        self.identify
            .iter()
            .filter_map(|e| to_outcome(e, line))
            .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal))
    }
}

fn first_match(entries: &[Entry], line: &str) -> Option<MatchOutcome> {
    entries.iter().find_map(|e| to_outcome(e, line))
}

fn match_keyed(
    table: &HashMap<String, Vec<Entry>>,
    line: &str,
) -> Option<(String, MatchOutcome)> {
    for (subtype, entries) in table {
        if let Some(outcome) = first_match(entries, line) {
            return Some((subtype.clone(), outcome));
        }
    }
    None
}

fn to_outcome(entry: &Entry, line: &str) -> Option<MatchOutcome> {
    let captures = entry.regex.captures(line)?;
    let mut groups = GroupMap::new();
    for name in entry.regex.capture_names().flatten() {
        if let Some(m) = captures.name(name) {
            if !m.as_str().is_empty() {
                groups.insert(name.to_string(), m.as_str().to_string());
            }
        }
    }
    Some(MatchOutcome {
        pattern_id: entry.record.id,
        groups,
        framework_hint: entry.record.framework_hint.clone(),
        confidence: entry.record.confidence,
    })
}
