// All LLM prompt constants for the Screening module.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;

/// Name of the forced tool that carries the structured assessment.
pub const ANALYSIS_TOOL_NAME: &str = "record_resume_analysis";

pub const ANALYSIS_TOOL_DESCRIPTION: &str =
    "Record the structured assessment of the attached resume against the job description.";

/// System prompt for resume analysis.
pub const ANALYSIS_SYSTEM: &str = "You are an expert HR recruiter. \
    Be critical and precise. \
    High scores (80+) should only be given to near-perfect matches. \
    Identify specific technical and soft skills.";

/// Resume analysis prompt template. Replace `{job_description}` before sending.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze the attached resume against the following Job Description.

Job Description:
{job_description}

Provide a structured JSON response: the candidate's full name, a match score from 0 to 100,
the job-description skills the candidate has, the important skills that are missing or weak,
and a brief professional summary of the candidate's suitability for the role."#;

pub fn analysis_system() -> String {
    format!("{ANALYSIS_SYSTEM} {JSON_ONLY_INSTRUCTION}")
}

pub fn analysis_prompt(job_description: &str) -> String {
    ANALYSIS_PROMPT_TEMPLATE.replace("{job_description}", job_description)
}
