//! Sequence matcher over string slices, with difflib semantics.
//!
//! Both the directory diff and the history diff reduce to "which lines of
//! these two sorted/ordered lists match up". The matcher greedily finds the
//! longest common contiguous block, then recurses on the unmatched prefix
//! and suffix on both sides. Ties between equally long blocks are broken by
//! the earliest start in the first sequence (then the second), so identical
//! inputs always produce identical block lists.

use std::collections::HashMap;

/// A maximal run of identical elements at (possibly shifted) positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchBlock {
    /// Start index in the first sequence.
    pub first: usize,
    /// Start index in the second sequence.
    pub second: usize,
    /// Number of matching elements.
    pub size: usize,
}

/// Compute the matching blocks between `a` and `b`, ordered by position.
///
/// The final block is always a zero-size sentinel at `(a.len(), b.len())`.
pub fn matching_blocks(a: &[String], b: &[String]) -> Vec<MatchBlock> {
    let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
    for (j, line) in b.iter().enumerate() {
        positions.entry(line.as_str()).or_default().push(j);
    }

    let mut pending = vec![(0, a.len(), 0, b.len())];
    let mut raw = Vec::new();

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let m = longest_match(a, &positions, alo, ahi, blo, bhi);
        if m.size == 0 {
            continue;
        }
        if alo < m.first && blo < m.second {
            pending.push((alo, m.first, blo, m.second));
        }
        if m.first + m.size < ahi && m.second + m.size < bhi {
            pending.push((m.first + m.size, ahi, m.second + m.size, bhi));
        }
        raw.push(m);
    }

    raw.sort_by_key(|m| (m.first, m.second));

    // Coalesce adjacent blocks so each one is maximal.
    let mut blocks: Vec<MatchBlock> = Vec::with_capacity(raw.len() + 1);
    for m in raw {
        if let Some(last) = blocks.last_mut()
            && last.first + last.size == m.first
            && last.second + last.size == m.second
        {
            last.size += m.size;
            continue;
        }
        blocks.push(m);
    }

    blocks.push(MatchBlock {
        first: a.len(),
        second: b.len(),
        size: 0,
    });
    blocks
}

/// Longest matching block within `a[alo..ahi]` and `b[blo..bhi]`.
///
/// `positions` maps each element of `b` to its indices. Strict `>` on the
/// running best keeps the earliest candidate on ties.
fn longest_match(
    a: &[String],
    positions: &HashMap<&str, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> MatchBlock {
    let mut best = MatchBlock {
        first: alo,
        second: blo,
        size: 0,
    };
    // run_ends[j] = length of the match ending at (i, j)
    let mut run_ends: HashMap<usize, usize> = HashMap::new();

    for i in alo..ahi {
        let mut next_runs = HashMap::new();
        if let Some(indices) = positions.get(a[i].as_str()) {
            for &j in indices {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let len = if j == 0 {
                    1
                } else {
                    run_ends.get(&(j - 1)).copied().unwrap_or(0) + 1
                };
                next_runs.insert(j, len);
                if len > best.size {
                    best = MatchBlock {
                        first: i + 1 - len,
                        second: j + 1 - len,
                        size: len,
                    };
                }
            }
        }
        run_ends = next_runs;
    }

    best
}

/// Elements of `b` that are not matched against `a` (inserts and the
/// insertion half of replacements).
pub fn additions(a: &[String], b: &[String]) -> Vec<String> {
    let mut adds = Vec::new();
    let mut cursor = 0;
    for block in matching_blocks(a, b) {
        adds.extend(b[cursor..block.second].iter().cloned());
        cursor = block.second + block.size;
    }
    adds
}

/// Elements of `a` that are not matched against `b`.
pub fn deletions(a: &[String], b: &[String]) -> Vec<String> {
    let mut dels = Vec::new();
    let mut cursor = 0;
    for block in matching_blocks(a, b) {
        dels.extend(a[cursor..block.first].iter().cloned());
        cursor = block.first + block.size;
    }
    dels
}

/// Elements common to both sequences, in matched order.
pub fn matches(a: &[String], b: &[String]) -> Vec<String> {
    let mut common = Vec::new();
    for block in matching_blocks(a, b) {
        common.extend(a[block.first..block.first + block.size].iter().cloned());
    }
    common
}
