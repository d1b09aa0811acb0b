//! Splits the heights of a crawl into batches for the workers.

use std::collections::HashSet;
use std::fmt;

use crate::rpc::RawLog;

/// Inclusive height range walked from `start` down to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Work unit handed to one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch {
    Range(BlockRange),
    /// Heights touched by the tracked contract's logs, highest first.
    Heights(Vec<u64>),
}

impl Batch {
    /// Batch over `heights`, stored highest first.
    pub fn from_heights(mut heights: Vec<u64>) -> Self {
        heights.sort_unstable_by(|a, b| b.cmp(a));
        Batch::Heights(heights)
    }

    /// The part of the batch at or below `height`.
    pub fn remaining_from(&self, height: u64) -> Batch {
        match self {
            Batch::Range(range) => Batch::Range(BlockRange {
                start: height.min(range.start),
                end: range.end,
            }),
            Batch::Heights(heights) => {
                Batch::Heights(heights.iter().copied().filter(|h| *h <= height).collect())
            }
        }
    }

    /// Heights in the order the worker processes them, highest first.
    pub fn heights(&self) -> Box<dyn Iterator<Item = u64> + Send + '_> {
        match self {
            Batch::Range(range) => Box::new((range.end..=range.start).rev()),
            Batch::Heights(heights) => Box::new(heights.iter().copied()),
        }
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Batch::Range(range) => write!(f, "blocks {range}"),
            Batch::Heights(heights) => write!(f, "{} contract heights", heights.len()),
        }
    }
}

/// Descending ranges covering `[floor, start]` exactly once.
///
/// Each range spans `batch_size` heights below its start; the next range
/// begins one below the previous end, and the last is clamped to `floor`.
/// Returns nothing when `start < floor`.
pub fn partition(start: u64, floor: u64, batch_size: u64) -> Vec<BlockRange> {
    if start < floor {
        return Vec::new();
    }
    let batch_size = batch_size.max(1);

    let mut ranges = Vec::with_capacity(((start - floor) / batch_size + 1) as usize);
    let mut current = start;
    loop {
        let end = current.saturating_sub(batch_size).max(floor);
        ranges.push(BlockRange {
            start: current,
            end,
        });
        if end == floor {
            break;
        }
        current = end - 1;
    }
    ranges
}

/// Chunks of distinct log heights, in first-seen log order.
pub fn fork_chunks(logs: &[RawLog], chunk_size: usize) -> Vec<Vec<u64>> {
    let mut seen = HashSet::new();
    let heights: Vec<u64> = logs
        .iter()
        .map(|log| log.block_number)
        .filter(|height| seen.insert(*height))
        .collect();

    heights
        .chunks(chunk_size.max(1))
        .map(<[u64]>::to_vec)
        .collect()
}
