//! Frame continuity checks.
//!
//! Gaps are reported as inclusive ranges, so the report is bounded by the
//! number of frames present rather than by the width of the frame range.

use serde::Serialize;
use std::fmt;

use crate::types::Frame;

/// An inclusive run of consecutive frame numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameRange {
    pub start: Frame,
    pub end: Frame,
}

impl FrameRange {
    pub fn new(start: Frame, end: Frame) -> Self {
        Self { start, end }
    }

    /// Number of frames in the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false; a range holds at least one frame.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, frame: Frame) -> bool {
        (self.start..=self.end).contains(&frame)
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Render ranges as `1003, 1007-1009`.
pub fn format_ranges(ranges: &[FrameRange]) -> String {
    ranges
        .iter()
        .map(FrameRange::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Gap report for a set of frame numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContinuityReport {
    pub first: Option<Frame>,
    pub last: Option<Frame>,
    /// Absent frames between `first` and `last`, ascending.
    pub missing: Vec<FrameRange>,
}

impl ContinuityReport {
    pub fn has_gaps(&self) -> bool {
        !self.missing.is_empty()
    }

    /// Total number of absent frames.
    pub fn missing_count(&self) -> u64 {
        self.missing.iter().map(FrameRange::len).sum()
    }
}

/// Whether any frame between the smallest and largest of `frames` is absent.
///
/// Does not allocate when `frames` is already ascending.
pub fn has_gaps(frames: &[Frame]) -> bool {
    if frames.windows(2).all(|w| w[0] <= w[1]) {
        frames.windows(2).any(|w| w[1] > w[0].saturating_add(1))
    } else {
        check_continuity(frames).has_gaps()
    }
}

/// Gaps in `frames` as inclusive ranges.
///
/// The input may be in any order and is left untouched.
pub fn find_missing_frames(frames: &[Frame]) -> Vec<FrameRange> {
    check_continuity(frames).missing
}

fn gap_ranges(sorted: &[Frame]) -> Vec<FrameRange> {
    sorted
        .windows(2)
        .filter(|w| w[1] > w[0].saturating_add(1))
        .map(|w| FrameRange::new(w[0] + 1, w[1] - 1))
        .collect()
}

/// Check `frames` for gaps between its smallest and largest value.
pub fn check_continuity(frames: &[Frame]) -> ContinuityReport {
    let (Some(&min), Some(&max)) = (frames.iter().min(), frames.iter().max()) else {
        return ContinuityReport::default();
    };

    let missing = if frames.windows(2).all(|w| w[0] <= w[1]) {
        gap_ranges(frames)
    } else {
        let mut present = frames.to_vec();
        present.sort_unstable();
        present.dedup();
        gap_ranges(&present)
    };

    ContinuityReport {
        first: Some(min),
        last: Some(max),
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_has_no_gaps() {
        let frames: Vec<Frame> = (1001..=1010).collect();
        let report = check_continuity(&frames);
        assert!(!report.has_gaps());
        assert!(!has_gaps(&frames));
        assert_eq!(report.first, Some(1001));
        assert_eq!(report.last, Some(1010));
    }

    #[test]
    fn each_removed_interior_frame_is_reported() {
        let full: Vec<Frame> = (1001..=1008).collect();
        for removed in 1002..=1007 {
            let frames: Vec<Frame> = full.iter().copied().filter(|f| *f != removed).collect();
            assert_eq!(
                find_missing_frames(&frames),
                vec![FrameRange::new(removed, removed)]
            );
            assert!(has_gaps(&frames));
        }
    }

    #[test]
    fn unordered_input_is_not_mutated() {
        let frames = vec![1005, 1001, 1002, 1004];
        let before = frames.clone();
        assert_eq!(find_missing_frames(&frames), vec![FrameRange::new(1003, 1003)]);
        assert!(has_gaps(&frames));
        assert_eq!(frames, before);
    }

    #[test]
    fn empty_and_single() {
        assert!(!check_continuity(&[]).has_gaps());
        assert!(!check_continuity(&[7]).has_gaps());
        assert!(!has_gaps(&[]));
    }

    #[test]
    fn wide_gap_is_one_range() {
        let report = check_continuity(&[1, 5, 6, 9]);
        assert_eq!(
            report.missing,
            vec![FrameRange::new(2, 4), FrameRange::new(7, 8)]
        );
        assert_eq!(report.missing_count(), 5);
        assert_eq!(report.missing[0].to_string(), "2-4");
        assert_eq!(report.missing[1].len(), 2);
    }

    #[test]
    fn huge_gap_stays_small() {
        let report = check_continuity(&[1, 4_000_000_000, 9_999_999_999]);
        assert_eq!(report.missing.len(), 2);
        assert_eq!(report.missing[0], FrameRange::new(2, 3_999_999_999));
        assert_eq!(report.missing_count(), 9_999_999_996);
        assert!(has_gaps(&[1, 4_000_000_000]));
    }

    #[test]
    fn duplicates_are_not_gaps() {
        assert!(!has_gaps(&[3, 1, 2, 2]));
        assert!(!check_continuity(&[1, 1, 2]).has_gaps());
    }
}
