use std::collections::HashMap;
use std::io::Read;

use crate::aggregate::ResultsView;
use crate::error::GENERIC_RELAY_ERROR;
use crate::models::SubmissionRecord;
use crate::relay::Relay;
use crate::report::{CandidateOutcome, CandidateReport};
use crate::validate::{self, FieldErrors};

pub type RawCandidate = HashMap<String, String>;

pub fn read_candidates<R: Read>(reader: R) -> anyhow::Result<Vec<RawCandidate>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut candidates = Vec::new();
    for row in reader.deserialize::<RawCandidate>() {
        candidates.push(row?);
    }
    Ok(candidates)
}

pub fn read_candidates_from_path(path: &std::path::Path) -> anyhow::Result<Vec<RawCandidate>> {
    let file = std::fs::File::open(path)?;
    read_candidates(file)
}

/// Row numbers are 1-based data rows, ignoring the header line.
pub fn validate_candidates(
    candidates: &[RawCandidate],
) -> Result<Vec<SubmissionRecord>, Vec<(usize, FieldErrors)>> {
    let mut records = Vec::with_capacity(candidates.len());
    let mut failures = Vec::new();

    for (index, candidate) in candidates.iter().enumerate() {
        match validate::validate_form(candidate) {
            Ok(record) => records.push(record),
            Err(errors) => failures.push((index + 1, errors)),
        }
    }

    if failures.is_empty() {
        Ok(records)
    } else {
        Err(failures)
    }
}

pub async fn score_candidates(relay: &Relay, records: &[SubmissionRecord]) -> Vec<CandidateReport> {
    let mut reports = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let outcome = match relay.score(record).await {
            Ok(result) => CandidateOutcome::Scored(ResultsView::from_result(&result)),
            Err(_) => CandidateOutcome::Failed(GENERIC_RELAY_ERROR.to_string()),
        };
        reports.push(CandidateReport {
            row: index + 1,
            outcome,
        });
    }
    reports
}
