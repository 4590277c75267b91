//! CSV export of analysis results.

use crate::models::analysis::AnalysisResult;

pub const CSV_FILENAME: &str = "resume_matches.csv";

const CSV_HEADERS: [&str; 6] = [
    "Candidate Name",
    "Filename",
    "Match Score",
    "Matched Skills",
    "Missing Skills",
    "Summary",
];

/// One header row plus one row per result, `\n`-separated.
/// Text fields are always quoted; the score is a bare number.
pub fn to_csv(results: &[AnalysisResult]) -> String {
    let mut lines = Vec::with_capacity(results.len() + 1);
    lines.push(CSV_HEADERS.join(","));

    for r in results {
        lines.push(
            [
                quote(&r.candidate_name),
                quote(&r.filename),
                r.match_score.to_string(),
                quote(&r.matched_skills.join(", ")),
                quote(&r.missing_skills.join(", ")),
                quote(&r.summary),
            ]
            .join(","),
        );
    }

    lines.join("\n")
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
