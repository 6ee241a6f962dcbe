//! Descriptor matching between the previous (source) and current (target) frame.

pub mod brute_force;
pub mod flann;

use crate::config::{DistanceMetric, MatcherType, SelectorType, TrackingConfig};
use crate::error::{Result, TrackingError};
use crate::types::{DescriptorMatrix, Descriptors, KeyPoint, Match};

/// A k-nearest-neighbour candidate is kept only when `best < RATIO_THRESHOLD * second`.
pub const RATIO_THRESHOLD: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSettings {
    pub metric: DistanceMetric,
    pub matcher: MatcherType,
    pub selector: SelectorType,
}

impl From<&TrackingConfig> for MatchSettings {
    fn from(config: &TrackingConfig) -> Self {
        Self {
            metric: config.metric,
            matcher: config.matcher,
            selector: config.selector,
        }
    }
}

/// Candidate `(target index, distance)` lists, one per source row, closest first.
pub type Candidates = Vec<Vec<(usize, f32)>>;

/// Row storage the matchers can search.
///
/// `coord` exposes the split coordinates used by the kd-tree index: single bits for
/// packed binary rows, elements for float rows.
pub trait DescriptorSpace: Sync {
    type Elem: Copy + Sync;

    fn len(&self) -> usize;

    fn row(&self, idx: usize) -> &[Self::Elem];

    fn dims(&self) -> usize;

    fn coord(row: &[Self::Elem], dim: usize) -> f32;

    fn distance(a: &[Self::Elem], b: &[Self::Elem]) -> f32;

    /// Cost of crossing a split whose threshold lies `diff` away from the query.
    fn margin(diff: f32) -> f32;

    /// Converts the summed margins of the crossed splits into a bound on `distance`.
    fn bound(margins: f32) -> f32;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

impl DescriptorSpace for DescriptorMatrix<u8> {
    type Elem = u8;

    fn len(&self) -> usize {
        self.rows()
    }

    fn row(&self, idx: usize) -> &[u8] {
        DescriptorMatrix::row(self, idx)
    }

    fn dims(&self) -> usize {
        self.width() * 8
    }

    fn coord(row: &[u8], dim: usize) -> f32 {
        ((row[dim / 8] >> (dim % 8)) & 1) as f32
    }

    fn distance(a: &[u8], b: &[u8]) -> f32 {
        hamming_distance(a, b) as f32
    }

    // rows behind a crossed bit split all differ from the query in that bit
    fn margin(_diff: f32) -> f32 {
        1.0
    }

    fn bound(margins: f32) -> f32 {
        margins
    }
}

impl DescriptorSpace for DescriptorMatrix<f32> {
    type Elem = f32;

    fn len(&self) -> usize {
        self.rows()
    }

    fn row(&self, idx: usize) -> &[f32] {
        DescriptorMatrix::row(self, idx)
    }

    fn dims(&self) -> usize {
        self.width()
    }

    fn coord(row: &[f32], dim: usize) -> f32 {
        row[dim]
    }

    fn distance(a: &[f32], b: &[f32]) -> f32 {
        l2_distance(a, b)
    }

    fn margin(diff: f32) -> f32 {
        diff * diff
    }

    fn bound(margins: f32) -> f32 {
        margins.sqrt()
    }
}

/// Inserts `(idx, distance)` into the ascending list `best`, keeping at most `k` entries.
///
/// Equal distances are ordered by target index.
pub(crate) fn push_candidate(best: &mut Vec<(usize, f32)>, k: usize, idx: usize, distance: f32) {
    let pos = best
        .iter()
        .position(|&(i, d)| distance < d || (distance == d && idx < i))
        .unwrap_or(best.len());
    if pos < k {
        best.insert(pos, (idx, distance));
        best.truncate(k);
    }
}

/// Matches `source_desc` (previous frame) against `target_desc` (current frame).
///
/// Query indices of the returned matches refer to the source, train indices to the
/// target. The result is ordered by source index; callers should not rely on it.
pub fn match_descriptors(
    source_kpts: &[KeyPoint],
    target_kpts: &[KeyPoint],
    source_desc: &Descriptors,
    target_desc: &Descriptors,
    settings: &MatchSettings,
) -> Result<Vec<Match>> {
    for (kpts, desc) in [(source_kpts, source_desc), (target_kpts, target_desc)] {
        if kpts.len() != desc.len() {
            return Err(TrackingError::DescriptorCountMismatch {
                keypoints: kpts.len(),
                descriptors: desc.len(),
            });
        }
    }
    let layout_mismatch = || TrackingError::DescriptorLayoutMismatch {
        source_layout: source_desc.layout(),
        target_layout: target_desc.layout(),
    };
    if source_desc.family() != target_desc.family()
        || (source_desc.width() != target_desc.width()
            && !source_desc.is_empty()
            && !target_desc.is_empty())
    {
        return Err(layout_mismatch());
    }
    settings.metric.check_family(source_desc.family())?;

    if source_desc.is_empty() || target_desc.is_empty() {
        return Ok(Vec::new());
    }

    let k = match settings.selector {
        SelectorType::NearestNeighbor => 1,
        SelectorType::KNearestRatio => 2,
    };
    let candidates = match (source_desc, target_desc) {
        (Descriptors::Binary(s), Descriptors::Binary(t)) => knn(s, t, k, settings.matcher),
        (Descriptors::Float(s), Descriptors::Float(t)) => knn(s, t, k, settings.matcher),
        _ => return Err(layout_mismatch()),
    };
    let matches = select(candidates, settings.selector);
    log::debug!(
        "{} / {} matched {} of {} descriptors",
        settings.matcher,
        settings.selector,
        matches.len(),
        source_desc.len()
    );
    Ok(matches)
}

fn knn<S: DescriptorSpace>(source: &S, target: &S, k: usize, matcher: MatcherType) -> Candidates {
    match matcher {
        MatcherType::BruteForce => brute_force::knn_match(source, target, k),
        MatcherType::Flann => flann::FlannIndex::build(target).knn_match(source, k),
    }
}

/// Turns per-source candidate lists into matches according to `selector`.
pub fn select(candidates: Candidates, selector: SelectorType) -> Vec<Match> {
    candidates
        .into_iter()
        .enumerate()
        .filter_map(|(query_idx, c)| match selector {
            SelectorType::NearestNeighbor => c
                .first()
                .map(|&(train_idx, d)| Match::new(query_idx, train_idx, d)),
            SelectorType::KNearestRatio => {
                if c.len() >= 2 && c[0].1 < RATIO_THRESHOLD * c[1].1 {
                    Some(Match::new(query_idx, c[0].0, c[0].1))
                } else {
                    None
                }
            }
        })
        .collect()
}
