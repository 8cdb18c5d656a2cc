use serde::Serialize;

use crate::models::{DisplayRow, Placed, PredictionResult};
use crate::store::{ResultStore, SessionId};

pub fn build_rows(result: &PredictionResult) -> Vec<DisplayRow> {
    result
        .iter()
        .map(|(model, prediction)| DisplayRow {
            model: model.to_string(),
            placed: if prediction.is_placed() {
                Placed::Yes
            } else {
                Placed::No
            },
            probability_percent: percent(prediction.probability),
        })
        .collect()
}

fn percent(probability: f64) -> u8 {
    (probability * 100.0).round().clamp(0.0, 100.0) as u8
}

pub fn average_probability(rows: &[DisplayRow]) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let total: u32 = rows.iter().map(|row| u32::from(row.probability_percent)).sum();
    Some(f64::from(total) / rows.len() as f64)
}

/// State of the results page. `NoData` is terminal for a mount.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResultsView {
    NoData,
    DisplayingRows {
        rows: Vec<DisplayRow>,
        average_probability: Option<f64>,
    },
}

impl ResultsView {
    pub fn from_result(result: &PredictionResult) -> Self {
        let rows = build_rows(result);
        let average_probability = average_probability(&rows);
        Self::DisplayingRows {
            rows,
            average_probability,
        }
    }

    pub fn mount(store: &ResultStore, session: SessionId) -> Self {
        match store.get(session) {
            Some(result) => Self::from_result(&result),
            None => Self::NoData,
        }
    }
}
