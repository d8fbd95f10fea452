//! Content-shape validation of multi-channel responses.
//!
//! The schedule service answers HTTP 200 even when it silently drops channels
//! from a large batch, so a batch response is judged by how many of the
//! requested channels it actually names.

use std::collections::HashSet;

use serde::Serialize;

use crate::types::SchedulePayload;

/// Why a batch response was accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageVerdict {
    /// Nothing was requested.
    EmptyRequest,
    /// Zero identifier overlap but at least as many entries as requested:
    /// the service keyed the records some other way.
    FullCountNoOverlap,
    /// Overlap ratio reached the threshold.
    RatioMet,
    /// Overlap ratio fell below the threshold.
    RatioBelow,
}

/// Outcome of validating one batch response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub requested: usize,
    pub returned_entries: usize,
    pub overlap: usize,
    pub ratio: f64,
    pub verdict: CoverageVerdict,
}

impl CoverageReport {
    pub fn accepted(&self) -> bool {
        !matches!(self.verdict, CoverageVerdict::RatioBelow)
    }
}

/// Accepts a batch response when enough requested channels appear in it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageValidator {
    min_ratio: f64,
}

impl Default for CoverageValidator {
    fn default() -> Self {
        Self { min_ratio: 0.75 }
    }
}

impl CoverageValidator {
    pub fn new(min_ratio: f64) -> Self {
        Self { min_ratio }
    }

    pub fn min_ratio(&self) -> f64 {
        self.min_ratio
    }

    pub fn evaluate(&self, requested: &[String], payload: &SchedulePayload) -> CoverageReport {
        let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();
        let returned_entries = payload.schedules().len();

        if wanted.is_empty() {
            return CoverageReport {
                requested: 0,
                returned_entries,
                overlap: 0,
                ratio: 1.0,
                verdict: CoverageVerdict::EmptyRequest,
            };
        }

        let got: HashSet<&str> = payload.channel_ids().into_iter().collect();
        let overlap = wanted.intersection(&got).count();
        let ratio = overlap as f64 / wanted.len() as f64;

        let verdict = if overlap == 0 && returned_entries >= wanted.len() {
            CoverageVerdict::FullCountNoOverlap
        } else if ratio >= self.min_ratio {
            CoverageVerdict::RatioMet
        } else {
            CoverageVerdict::RatioBelow
        };

        CoverageReport {
            requested: wanted.len(),
            returned_entries,
            overlap,
            ratio,
            verdict,
        }
    }

    pub fn accepts(&self, requested: &[String], payload: &SchedulePayload) -> bool {
        self.evaluate(requested, payload).accepted()
    }
}
