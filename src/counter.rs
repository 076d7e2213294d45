//! Trusted reference word counter.
//!
//! This is the oracle the worker's output is judged against, so it must
//! stay independent of any worker-side counting logic: plain whitespace
//! tokenization over the raw input lines, nothing shared.

use std::collections::BTreeMap;

/// Tally word occurrences across `lines`.
///
/// Each line is split on runs of whitespace; tokens are surrounding-
/// whitespace-trimmed by construction and empty tokens never appear.
/// Counting is case-sensitive. The sum of all counts equals the total
/// token count of the input.
pub fn count_words<I, S>(lines: I) -> BTreeMap<String, u64>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts = BTreeMap::new();
    for line in lines {
        for word in line.as_ref().split_whitespace() {
            *counts.entry(word.to_owned()).or_insert(0) += 1;
        }
    }
    counts
}
