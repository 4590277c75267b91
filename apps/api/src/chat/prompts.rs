// Prompt construction for the candidate chat assistant.

use serde::Serialize;

use crate::chat::session::ChatContext;
use crate::llm_client::prompts::NO_FABRICATION_INSTRUCTION;

/// Characters of the job description kept in the chat system instruction.
pub const JD_CONTEXT_CHARS: usize = 1000;

#[derive(Debug, Serialize)]
struct CandidateBrief<'a> {
    name: &'a str,
    score: u32,
    skills: &'a [String],
    missing: &'a [String],
    summary: &'a str,
}

/// Builds the system instruction for a chat session from its context.
pub fn build_system_instruction(context: &ChatContext) -> String {
    let job_description: String = context
        .job_description
        .chars()
        .take(JD_CONTEXT_CHARS)
        .collect();

    let briefs: Vec<CandidateBrief<'_>> = context
        .candidates
        .iter()
        .map(|r| CandidateBrief {
            name: &r.candidate_name,
            score: r.match_score,
            skills: &r.matched_skills,
            missing: &r.missing_skills,
            summary: &r.summary,
        })
        .collect();
    let candidates_json = serde_json::to_string_pretty(&briefs).unwrap_or_default();

    format!(
        r#"You are an expert HR Assistant.
You have access to a list of candidates analyzed against a specific Job Description.

Current Job Description:
"{job_description}..." (truncated for brevity if too long)

Analyzed Candidates Data:
{candidates_json}

Your goal is to answer questions about these candidates, compare them, suggest who to interview, and explain why certain candidates received their scores.
Be professional, insightful, and helpful. {NO_FABRICATION_INSTRUCTION}"#
    )
}
