// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output when the model
/// answers in text instead of calling the tool.
pub const JSON_ONLY_INSTRUCTION: &str = "If you cannot call the provided tool, \
    respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Instruction that keeps answers inside the supplied data.
pub const NO_FABRICATION_INSTRUCTION: &str = "\
    Only state facts present in the data you were given. \
    If asked about data not present, say you don't have that information.";
