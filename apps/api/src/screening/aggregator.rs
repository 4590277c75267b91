//! Result Aggregator: pure views over completed analyses.
//!
//! Nothing here is stored: every view is recomputed from the current
//! processed results on each read.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::analysis::AnalysisResult;

/// Minimum score for a candidate to count as qualified.
pub const QUALIFIED_THRESHOLD: u32 = 70;
pub const TOP_SKILLS_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    Strong,   // ≥ 80
    Moderate, // 60 – 79
    Weak,
}

impl ScoreBand {
    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            ScoreBand::Strong
        } else if score >= 60 {
            ScoreBand::Moderate
        } else {
            ScoreBand::Weak
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillCount {
    pub skill: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BandDistribution {
    pub strong: usize,
    pub moderate: usize,
    pub weak: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_candidates: usize,
    pub avg_score: u32,
    pub qualified_candidates: usize,
    pub top_candidate: Option<AnalysisResult>,
    pub top_skills: Vec<SkillCount>,
    pub score_bands: BandDistribution,
}

/// Rounded mean score, 0 when there are no results.
pub fn average_score(results: &[AnalysisResult]) -> u32 {
    if results.is_empty() {
        return 0;
    }
    let sum: u64 = results.iter().map(|r| u64::from(r.match_score)).sum();
    (sum as f64 / results.len() as f64).round() as u32
}

pub fn qualified_count(results: &[AnalysisResult]) -> usize {
    results
        .iter()
        .filter(|r| r.match_score >= QUALIFIED_THRESHOLD)
        .count()
}

/// Highest-scoring result; the first one wins a tie.
pub fn top_candidate(results: &[AnalysisResult]) -> Option<&AnalysisResult> {
    results.iter().fold(None, |best: Option<&AnalysisResult>, r| match best {
        Some(b) if b.match_score >= r.match_score => Some(b),
        _ => Some(r),
    })
}

/// Occurrences of each matched skill, in first-seen order.
pub fn skill_frequency(results: &[AnalysisResult]) -> Vec<SkillCount> {
    let mut counts: Vec<SkillCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for skill in results.iter().flat_map(|r| r.matched_skills.iter()) {
        match index.get(skill.as_str()) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(skill.as_str(), counts.len());
                counts.push(SkillCount {
                    skill: skill.clone(),
                    count: 1,
                });
            }
        }
    }
    counts
}

/// Most frequent skills by descending count; ties keep first-seen order.
pub fn top_skills(results: &[AnalysisResult], limit: usize) -> Vec<SkillCount> {
    let mut counts = skill_frequency(results);
    counts.sort_by(|a, b| b.count.cmp(&a.count)); // stable
    counts.truncate(limit);
    counts
}

/// Results by descending score. Equal scores keep queue order.
pub fn rank(results: &[AnalysisResult]) -> Vec<AnalysisResult> {
    let mut ranked = results.to_vec();
    ranked.sort_by(|a, b| b.match_score.cmp(&a.match_score));
    ranked
}

pub fn band_distribution(results: &[AnalysisResult]) -> BandDistribution {
    results
        .iter()
        .fold(BandDistribution::default(), |mut dist, r| {
            match ScoreBand::from_score(r.match_score) {
                ScoreBand::Strong => dist.strong += 1,
                ScoreBand::Moderate => dist.moderate += 1,
                ScoreBand::Weak => dist.weak += 1,
            }
            dist
        })
}

pub fn dashboard(results: &[AnalysisResult]) -> DashboardStats {
    DashboardStats {
        total_candidates: results.len(),
        avg_score: average_score(results),
        qualified_candidates: qualified_count(results),
        top_candidate: top_candidate(results).cloned(),
        top_skills: top_skills(results, TOP_SKILLS_LIMIT),
        score_bands: band_distribution(results),
    }
}
