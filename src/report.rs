use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::aggregate::ResultsView;
use crate::models::DisplayRow;

pub const NO_DATA_MESSAGE: &str = "No data submitted";

const BAR_WIDTH: usize = 50;

fn bar(percent: u8) -> String {
    let filled = (usize::from(percent) * BAR_WIDTH + 50) / 100;
    "#".repeat(filled)
}

pub fn render_table(rows: &[DisplayRow]) -> String {
    let model_width = rows
        .iter()
        .map(|row| row.model.chars().count())
        .chain(std::iter::once("Model".len()))
        .max()
        .unwrap_or_default();

    let mut output = String::new();
    let _ = writeln!(
        output,
        "{:<model_width$} | Placed | Probability (%)",
        "Model"
    );
    let _ = writeln!(output, "{}-+--------+----------------", "-".repeat(model_width));
    for row in rows {
        let _ = writeln!(
            output,
            "{:<model_width$} | {:<6} | {}%",
            row.model, row.placed, row.probability_percent
        );
    }
    output
}

pub fn render_chart(rows: &[DisplayRow]) -> String {
    let model_width = rows
        .iter()
        .map(|row| row.model.chars().count())
        .max()
        .unwrap_or_default();

    let mut output = String::new();
    for row in rows {
        let _ = writeln!(
            output,
            "{:>model_width$} |{} {}%",
            row.model,
            bar(row.probability_percent),
            row.probability_percent
        );
    }
    output
}

/// The results page as plain text. The mean is left out, as on the page.
pub fn render_view(view: &ResultsView) -> String {
    match view {
        ResultsView::NoData => format!("{NO_DATA_MESSAGE}\n"),
        ResultsView::DisplayingRows { rows, .. } => {
            let mut output = String::new();
            let _ = writeln!(output, "Submission Results");
            let _ = writeln!(output);
            output.push_str(&render_chart(rows));
            let _ = writeln!(output);
            output.push_str(&render_table(rows));
            output
        }
    }
}

#[derive(Debug, Clone)]
pub enum CandidateOutcome {
    Scored(ResultsView),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct CandidateReport {
    pub row: usize,
    pub outcome: CandidateOutcome,
}

pub fn build_batch_report(
    source: &str,
    generated_at: DateTime<Utc>,
    candidates: &[CandidateReport],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Placement Prediction Report");
    let _ = writeln!(
        output,
        "Generated from {} at {}",
        source,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    if candidates.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No candidates in this file.");
        return output;
    }

    for candidate in candidates {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Candidate {}", candidate.row);

        match &candidate.outcome {
            CandidateOutcome::Failed(message) => {
                let _ = writeln!(output, "Prediction failed: {message}");
            }
            CandidateOutcome::Scored(ResultsView::NoData) => {
                let _ = writeln!(output, "{NO_DATA_MESSAGE}");
            }
            CandidateOutcome::Scored(ResultsView::DisplayingRows {
                rows,
                average_probability,
            }) => {
                let _ = writeln!(output, "| Model | Placed | Probability (%) |");
                let _ = writeln!(output, "|---|---|---|");
                for row in rows {
                    let _ = writeln!(
                        output,
                        "| {} | {} | {}% |",
                        row.model, row.placed, row.probability_percent
                    );
                }
                let _ = writeln!(output);
                match average_probability {
                    Some(average) => {
                        let _ = writeln!(output, "Average probability: {average:.2}%");
                    }
                    None => {
                        let _ = writeln!(output, "No models returned a prediction.");
                    }
                }
            }
        }
    }

    output
}
