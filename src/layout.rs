use serde::Serialize;
use utoipa::ToSchema;

use crate::models::Occurrence;

/// An occurrence plus its slot in the day's time-grid column layout.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PositionedOccurrence {
    #[serde(flatten)]
    pub occurrence: Occurrence,
    pub column: usize,
    pub total_columns: usize,
    /// Stable palette index for the occurrence's teacher.
    pub color_index: usize,
}

pub const TEACHER_PALETTE_SIZE: usize = 10;

/// Lays out one date's occurrences as time-grid columns.
///
/// Greedy interval-graph coloring: occurrences sorted by start time (stable)
/// each take the lowest column not used by an already-placed overlapping
/// occurrence. `total_columns` is then widened to the column count of the
/// whole transitively-connected overlap component, so every member of a
/// cluster renders at the same width. Disjoint occurrences keep
/// `total_columns = 1`.
pub fn assign_columns(occurrences: &[Occurrence]) -> Vec<PositionedOccurrence> {
    let mut sorted: Vec<&Occurrence> = occurrences.iter().collect();
    sorted.sort_by(|a, b| a.start_time.cmp(&b.start_time));

    let mut positioned: Vec<PositionedOccurrence> = Vec::with_capacity(sorted.len());
    for occ in sorted {
        let used: Vec<usize> = positioned
            .iter()
            .filter(|p| overlaps(&p.occurrence, occ))
            .map(|p| p.column)
            .collect();
        let mut column = 0;
        while used.contains(&column) {
            column += 1;
        }
        positioned.push(PositionedOccurrence {
            occurrence: occ.clone(),
            column,
            total_columns: 1,
            color_index: color_for_key(teacher_key(occ), TEACHER_PALETTE_SIZE),
        });
    }

    // Widen total_columns per connected component. Entries are start-sorted,
    // so a component ends exactly where the running max end time stops
    // covering the next start.
    let mut idx = 0;
    while idx < positioned.len() {
        let mut end = positioned[idx].occurrence.end_time;
        let mut last = idx;
        while last + 1 < positioned.len() && positioned[last + 1].occurrence.start_time < end {
            last += 1;
            end = end.max(positioned[last].occurrence.end_time);
        }
        let width = positioned[idx..=last]
            .iter()
            .map(|p| p.column + 1)
            .max()
            .unwrap_or(1);
        for p in &mut positioned[idx..=last] {
            p.total_columns = width;
        }
        idx = last + 1;
    }

    positioned
}

fn overlaps(a: &Occurrence, b: &Occurrence) -> bool {
    a.start_time < b.end_time && a.end_time > b.start_time
}

fn teacher_key(occ: &Occurrence) -> &str {
    if !occ.teacher_id.is_empty() {
        &occ.teacher_id
    } else if !occ.teacher_name.is_empty() {
        &occ.teacher_name
    } else {
        "unknown"
    }
}

/// Deterministic palette index for a key: FNV-1a over the key bytes modulo
/// the palette size. Stable across calls, instances and restarts.
pub fn color_for_key(key: &str, palette_size: usize) -> usize {
    debug_assert!(palette_size > 0);
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    (hash % palette_size as u64) as usize
}
