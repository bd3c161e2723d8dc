//! ReDoS-safety validation for pattern-registry regexes.
//!
//! Operators can author patterns through the catalogue store, so a
//! pathological regex must never reach the matcher unfiltered. This applies
//! cheap, syntactic heuristics before compilation rather than a runtime
//! step-count guard, since `regex` itself guarantees linear-time matching
//! for everything it accepts — the real risk here is a pattern so large or
//! so repetitive that compilation itself becomes expensive.

use crate::constants::defaults;

/// A pattern failed the ReDoS-safety guard and was rejected before
/// compilation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PatternGuardError {
    /// Pattern source exceeds [`defaults::MAX_PATTERN_LENGTH`].
    #[error("pattern length {0} exceeds max {max}", max = defaults::MAX_PATTERN_LENGTH)]
    TooLong(usize),

    /// A bounded repetition count exceeds [`defaults::MAX_PATTERN_REPETITION`].
    #[error("repetition count {0} exceeds max {max}", max = defaults::MAX_PATTERN_REPETITION)]
    RepetitionTooLarge(u32),

    /// Nested quantifiers of the form `(a+)+` were detected, a classic
    /// catastrophic-backtracking shape in backtracking engines; rejected
    /// defensively even though `regex` does not backtrack.
    NestedQuantifiers,
}

impl std::fmt::Display for PatternGuardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooLong(n) => write!(f, "pattern length {n} exceeds max {}", defaults::MAX_PATTERN_LENGTH),
            Self::RepetitionTooLarge(n) => {
                write!(f, "repetition count {n} exceeds max {}", defaults::MAX_PATTERN_REPETITION)
            }
            Self::NestedQuantifiers => write!(f, "nested quantifiers are not allowed"),
        }
    }
}

/// Validate a pattern's source text before compilation.
///
/// # Errors
///
/// Returns [`PatternGuardError`] if the pattern is too long, contains an
/// excessive bounded repetition, or looks like a nested-quantifier shape.
pub fn validate_pattern(source: &str) -> Result<(), PatternGuardError> {
    if source.len() > defaults::MAX_PATTERN_LENGTH {
        return Err(PatternGuardError::TooLong(source.len()));
    }

    if let Some(count) = max_repetition_count(source) {
        if count > defaults::MAX_PATTERN_REPETITION {
            return Err(PatternGuardError::RepetitionTooLarge(count));
        }
    }

    if has_nested_quantifiers(source) {
        return Err(PatternGuardError::NestedQuantifiers);
    }

    Ok(())
}

/// Scan `{m,n}` repetition bounds and return the largest number seen, if
/// any.
fn max_repetition_count(source: &str) -> Option<u32> {
    let bytes = source.as_bytes();
    let mut max_seen = None;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = source[i..].find('}') {
                let inner = &source[i + 1..i + end];
                for part in inner.split(',') {
                    if let Ok(n) = part.trim().parse::<u32>() {
                        max_seen = Some(max_seen.map_or(n, |m: u32| m.max(n)));
                    }
                }
                i += end;
            }
        }
        i += 1;
    }
    max_seen
}

/// Detect the `(X+)+`, `(X*)+`, `(X+)*`, `(X*)*` family of nested
/// quantifiers, scanning for a quantifier immediately following a closing
/// paren whose group body itself ends in a quantifier.
fn has_nested_quantifiers(source: &str) -> bool {
    let chars: Vec<char> = source.chars().collect();
    let mut depth_ends: Vec<usize> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '(' => stack.push(i),
            ')' => {
                if let Some(start) = stack.pop() {
                    depth_ends.push(start);
                    let inner_ends_quantified = chars
                        .get(i.wrapping_sub(1))
                        .is_some_and(|&c| c == '+' || c == '*');
                    let outer_quantified = chars
                        .get(i + 1)
                        .is_some_and(|&c| c == '+' || c == '*');
                    if inner_ends_quantified && outer_quantified && i > start + 1 {
                        return true;
                    }
                }
            }
            _ => {}
        }
    }
    false
}
