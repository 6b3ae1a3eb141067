use crate::envelope::Envelope;
use crate::error::{DomainError, DomainResult};
use crate::types::{DiagnosticReading, GpsPoint, IncidentReport};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Size limits for a persisted report record.
#[derive(Debug, Clone)]
pub struct CompactionLimits {
    pub max_trail_points: usize,
    pub max_diagnostics: usize,
    /// The storage backend's record-size limit in serialized bytes
    pub max_record_bytes: usize,
}

impl Default for CompactionLimits {
    fn default() -> Self {
        Self {
            max_trail_points: 120,
            max_diagnostics: 10,
            max_record_bytes: 10_000,
        }
    }
}

/// Reduces a full report to fit the record-size ceiling.
///
/// Pure and deterministic: same input, same output, independent of call
/// order or external state.
pub struct ReportCompactor {
    limits: CompactionLimits,
}

impl ReportCompactor {
    pub fn new(limits: CompactionLimits) -> Self {
        Self { limits }
    }

    /// Compact a report so its envelope serializes under the byte ceiling.
    ///
    /// Scalar fields are kept verbatim; photos, HOS and g-force are dropped
    /// (regenerated or refetched on demand, never stored). The GPS trail is
    /// sampled down, halving the point budget until the record fits.
    pub fn compact(&self, report: &IncidentReport) -> DomainResult<IncidentReport> {
        let mut compacted = report.clone();
        compacted.evidence.photos = Vec::new();
        compacted.evidence.hours_of_service = None;
        compacted.evidence.g_force = None;
        compacted.evidence.diagnostics = rank_diagnostics(
            &report.evidence.diagnostics,
            report.occurred_at,
            self.limits.max_diagnostics,
        );

        let mut budget = self.limits.max_trail_points;
        loop {
            compacted.evidence.gps_trail =
                sample_trail(&report.evidence.gps_trail, report.occurred_at, budget);

            let size = Envelope::Report(compacted.clone()).encoded_len()?;
            if size <= self.limits.max_record_bytes {
                return Ok(compacted);
            }
            if budget <= 3 {
                return Err(DomainError::RecordTooLarge {
                    size,
                    limit: self.limits.max_record_bytes,
                });
            }
            budget = (budget / 2).max(3);
        }
    }
}

/// Deterministically sample a trail down to `max_points`.
///
/// Under budget the trail is returned unchanged. Over budget the first
/// point, the last point and the point nearest `occurred_at` always
/// survive; remaining slots are filled with evenly strided interior points,
/// with a strided pick that collides with an already-kept index shifted to
/// the nearest free interior index. The result is sorted by timestamp.
pub fn sample_trail(
    trail: &[GpsPoint],
    occurred_at: DateTime<Utc>,
    max_points: usize,
) -> Vec<GpsPoint> {
    let len = trail.len();
    // The three semantically critical points survive regardless of budget
    let max_points = max_points.max(3);
    if len <= max_points {
        return trail.to_vec();
    }

    let nearest = nearest_index(trail, occurred_at);

    let mut keep: BTreeSet<usize> = BTreeSet::new();
    keep.insert(0);
    keep.insert(len - 1);
    keep.insert(nearest);

    let slots = max_points - keep.len();
    let stride = (len - 1) as f64 / (slots as f64 + 1.0);
    for k in 1..=slots {
        let idx = ((k as f64 * stride).round() as usize).clamp(1, len - 2);
        if keep.insert(idx) {
            continue;
        }
        // Collision with the incident point (or a previous pick): take the
        // next free interior index instead
        let forward = (idx + 1..len - 1).find(|i| !keep.contains(i));
        let fallback = forward.or_else(|| (1..idx).rev().find(|i| !keep.contains(i)));
        if let Some(free) = fallback {
            keep.insert(free);
        }
    }

    let mut points: Vec<GpsPoint> = keep.into_iter().map(|i| trail[i].clone()).collect();
    points.sort_by_key(|p| p.timestamp);
    points
}

fn nearest_index(trail: &[GpsPoint], occurred_at: DateTime<Utc>) -> usize {
    trail
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| (p.timestamp - occurred_at).num_milliseconds().unsigned_abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Order diagnostics by nearness to the incident instant and truncate
fn rank_diagnostics(
    diagnostics: &[DiagnosticReading],
    occurred_at: DateTime<Utc>,
    max: usize,
) -> Vec<DiagnosticReading> {
    let mut ranked = diagnostics.to_vec();
    ranked.sort_by_key(|d| {
        (d.recorded_at - occurred_at)
            .num_milliseconds()
            .unsigned_abs()
    });
    ranked.truncate(max);
    ranked
}
