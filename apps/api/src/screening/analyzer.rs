//! Resume Analyzer — scores one resume file against the job description.
//!
//! `AppState` holds an `Arc<dyn ResumeAnalyzer>`; the orchestrator only ever sees
//! an `AnalysisOutcome`, so every failure is absorbed here.

use async_trait::async_trait;
use base64::Engine;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::llm_client::{LlmClient, LlmError, MediaSource, RequestBlock};
use crate::models::analysis::{AnalysisOutcome, AnalysisResult};
use crate::models::resume::ResumeFile;
use crate::screening::prompts::{
    analysis_prompt, analysis_system, ANALYSIS_TOOL_DESCRIPTION, ANALYSIS_TOOL_NAME,
};

/// Shape the model must produce. Field docs become schema descriptions.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CandidateAssessment {
    /// The full name of the candidate found in the resume.
    pub candidate_name: String,
    /// A score from 0 to 100 indicating how well the resume matches the job description.
    pub match_score: f64,
    /// List of skills from the job description that the candidate possesses.
    pub matched_skills: Vec<String>,
    /// List of important skills from the job description that are missing or weak in the resume.
    pub missing_skills: Vec<String>,
    /// A brief professional summary of the candidate's suitability for the role.
    pub summary: String,
}

impl CandidateAssessment {
    /// Converts the model output into a result bound to the local file name.
    pub fn into_result(self, filename: &str) -> Result<AnalysisResult, LlmError> {
        if !self.match_score.is_finite() {
            return Err(LlmError::InvalidOutput(format!(
                "matchScore is not a finite number: {}",
                self.match_score
            )));
        }

        Ok(AnalysisResult {
            candidate_name: self.candidate_name,
            match_score: self.match_score.round().clamp(0.0, 100.0) as u32,
            matched_skills: self.matched_skills,
            missing_skills: self.missing_skills,
            summary: self.summary,
            filename: filename.to_string(),
        })
    }
}

#[async_trait]
pub trait ResumeAnalyzer: Send + Sync {
    /// Never fails outward: errors come back as `AnalysisOutcome::Failed`.
    async fn analyze(&self, job_description: &str, file: &ResumeFile) -> AnalysisOutcome;
}

/// Claude-backed analyzer.
pub struct LlmResumeAnalyzer(pub LlmClient);

impl LlmResumeAnalyzer {
    async fn try_analyze(
        &self,
        job_description: &str,
        file: &ResumeFile,
    ) -> Result<AnalysisResult, LlmError> {
        let attachment = encode_resume(file)?;
        let blocks = vec![RequestBlock::text(analysis_prompt(job_description)), attachment];

        let assessment: CandidateAssessment = self
            .0
            .call_structured(
                &analysis_system(),
                blocks,
                ANALYSIS_TOOL_NAME,
                ANALYSIS_TOOL_DESCRIPTION,
            )
            .await?;

        assessment.into_result(&file.name)
    }
}

#[async_trait]
impl ResumeAnalyzer for LlmResumeAnalyzer {
    async fn analyze(&self, job_description: &str, file: &ResumeFile) -> AnalysisOutcome {
        match self.try_analyze(job_description, file).await {
            Ok(result) => {
                debug!(filename = %file.name, score = result.match_score, "Resume analyzed");
                AnalysisOutcome::Completed(result)
            }
            Err(e) => {
                warn!(filename = %file.name, error = %e, "Resume analysis failed");
                AnalysisOutcome::failed(&file.name, e.to_string())
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Payload encoding
// ────────────────────────────────────────────────────────────────────────────

const IMAGE_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/gif", "image/webp"];

const DOCX_TYPE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Effective MIME type of a file: the declared type without parameters, or a guess
/// from the extension when the declared type is missing or generic.
pub fn resolve_mime_type(name: &str, declared: &str) -> String {
    let declared = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    if declared.is_empty() || declared == "application/octet-stream" {
        return mime_guess::from_path(name)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
    }
    declared
}

/// Encodes the file as the content block the Messages API expects for its type.
pub fn encode_resume(file: &ResumeFile) -> Result<RequestBlock, LlmError> {
    let mime_type = resolve_mime_type(&file.name, &file.mime_type);

    if mime_type == "application/pdf" {
        return Ok(RequestBlock::Document {
            source: MediaSource::Base64 {
                media_type: mime_type,
                data: base64::engine::general_purpose::STANDARD.encode(&file.bytes),
            },
        });
    }

    if mime_type.starts_with("text/") {
        return Ok(RequestBlock::Document {
            source: MediaSource::Text {
                media_type: "text/plain".to_string(),
                data: String::from_utf8_lossy(&file.bytes).into_owned(),
            },
        });
    }

    if mime_type == DOCX_TYPE {
        return Ok(RequestBlock::Document {
            source: MediaSource::Text {
                media_type: "text/plain".to_string(),
                data: extract_docx_text(&file.bytes)?,
            },
        });
    }

    if IMAGE_TYPES.contains(&mime_type.as_str()) {
        return Ok(RequestBlock::Image {
            source: MediaSource::Base64 {
                media_type: mime_type,
                data: base64::engine::general_purpose::STANDARD.encode(&file.bytes),
            },
        });
    }

    Err(LlmError::UnsupportedMedia(mime_type))
}

/// Plain text of a Word document, one line per paragraph. Legacy `.doc` is not readable.
fn extract_docx_text(data: &[u8]) -> Result<String, LlmError> {
    let docx = docx_rs::read_docx(data).map_err(|e| LlmError::Extraction(e.to_string()))?;

    let mut text = String::new();
    for child in docx.document.children {
        if let docx_rs::DocumentChild::Paragraph(p) = child {
            for run in p.children {
                if let docx_rs::ParagraphChild::Run(run) = run {
                    for piece in run.children {
                        if let docx_rs::RunChild::Text(t) = piece {
                            text.push_str(&t.text);
                        }
                    }
                }
            }
            text.push('\n');
        }
    }

    if text.trim().is_empty() {
        return Err(LlmError::Extraction("no text found in document".to_string()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::models::analysis::FAILED_ANALYSIS_SUMMARY;

    fn pdf_file(name: &str) -> ResumeFile {
        ResumeFile::new(name, "application/pdf", Bytes::from_static(b"%PDF-1.4 fake"))
    }

    fn tool_response(input: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "content": [{
                "type": "tool_use",
                "id": "toolu_1",
                "name": ANALYSIS_TOOL_NAME,
                "input": input
            }],
            "usage": {"input_tokens": 100, "output_tokens": 50}
        }))
    }

    async fn analyzer_for(response: ResponseTemplate) -> (MockServer, LlmResumeAnalyzer) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(response)
            .mount(&server)
            .await;
        let analyzer = LlmResumeAnalyzer(LlmClient::new("k".to_string(), server.uri()));
        (server, analyzer)
    }

    #[test]
    fn test_resolve_mime_type_strips_parameters() {
        assert_eq!(
            resolve_mime_type("cv.txt", "Text/Plain; charset=utf-8"),
            "text/plain"
        );
    }

    #[test]
    fn test_resolve_mime_type_guesses_from_extension() {
        assert_eq!(
            resolve_mime_type("cv.pdf", "application/octet-stream"),
            "application/pdf"
        );
        assert_eq!(resolve_mime_type("notes.txt", ""), "text/plain");
    }

    #[test]
    fn test_encode_pdf_as_base64_document() {
        let block = encode_resume(&pdf_file("cv.pdf")).unwrap();
        match block {
            RequestBlock::Document {
                source: MediaSource::Base64 { media_type, data },
            } => {
                assert_eq!(media_type, "application/pdf");
                assert_eq!(data, "JVBERi0xLjQgZmFrZQ==");
            }
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn test_encode_text_as_text_document() {
        let file = ResumeFile::new("cv.txt", "text/plain", Bytes::from_static(b"Jane Doe"));
        let block = encode_resume(&file).unwrap();
        assert_eq!(
            block,
            RequestBlock::Document {
                source: MediaSource::Text {
                    media_type: "text/plain".to_string(),
                    data: "Jane Doe".to_string(),
                }
            }
        );
    }

    fn docx_bytes(paragraphs: &[&str]) -> Bytes {
        use docx_rs::{Docx, Paragraph, Run};

        let docx = paragraphs.iter().fold(Docx::new(), |docx, text| {
            docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text)))
        });
        let mut buffer = std::io::Cursor::new(Vec::new());
        docx.build().pack(&mut buffer).unwrap();
        Bytes::from(buffer.into_inner())
    }

    #[test]
    fn test_encode_docx_as_text_document() {
        let name = "cv.docx";
        let file = ResumeFile::new(
            name,
            resolve_mime_type(name, ""),
            docx_bytes(&["Jane Doe", "Rust, Tokio, Postgres"]),
        );

        match encode_resume(&file).unwrap() {
            RequestBlock::Document {
                source: MediaSource::Text { media_type, data },
            } => {
                assert_eq!(media_type, "text/plain");
                assert_eq!(data, "Jane Doe\nRust, Tokio, Postgres\n");
            }
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn test_encode_corrupt_docx_fails_extraction() {
        let file = ResumeFile::new("cv.docx", DOCX_TYPE, Bytes::from_static(b"PK not a zip"));
        assert!(matches!(encode_resume(&file), Err(LlmError::Extraction(_))));
    }

    #[test]
    fn test_encode_doc_is_unsupported() {
        let file = ResumeFile::new("cv.doc", "", Bytes::from_static(b"\xD0\xCF"));
        assert!(matches!(
            encode_resume(&file),
            Err(LlmError::UnsupportedMedia(_))
        ));
    }

    #[test]
    fn test_assessment_score_rounded_and_clamped() {
        let assessment = CandidateAssessment {
            candidate_name: "A".to_string(),
            match_score: 104.6,
            matched_skills: vec![],
            missing_skills: vec![],
            summary: String::new(),
        };
        assert_eq!(assessment.into_result("a.pdf").unwrap().match_score, 100);

        let assessment = CandidateAssessment {
            candidate_name: "B".to_string(),
            match_score: 72.5,
            matched_skills: vec![],
            missing_skills: vec![],
            summary: String::new(),
        };
        assert_eq!(assessment.into_result("b.pdf").unwrap().match_score, 73);
    }

    #[test]
    fn test_assessment_non_finite_score_rejected() {
        let assessment = CandidateAssessment {
            candidate_name: "A".to_string(),
            match_score: f64::NAN,
            matched_skills: vec![],
            missing_skills: vec![],
            summary: String::new(),
        };
        assert!(matches!(
            assessment.into_result("a.pdf"),
            Err(LlmError::InvalidOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_analyze_success_uses_local_filename() {
        let (_server, analyzer) = analyzer_for(tool_response(json!({
            "candidateName": "Jane Doe",
            "matchScore": 86,
            "matchedSkills": ["Rust", "Tokio"],
            "missingSkills": ["Kafka"],
            "summary": "Strong systems background.",
            "filename": "model-invented.pdf"
        })))
        .await;

        let outcome = analyzer.analyze("Rust engineer", &pdf_file("jane.pdf")).await;
        let AnalysisOutcome::Completed(result) = outcome else {
            panic!("expected completed outcome");
        };
        assert_eq!(result.candidate_name, "Jane Doe");
        assert_eq!(result.match_score, 86);
        assert_eq!(result.matched_skills, vec!["Rust", "Tokio"]);
        assert_eq!(result.filename, "jane.pdf");
    }

    #[tokio::test]
    async fn test_analyze_genuine_zero_score_is_completed() {
        let (_server, analyzer) = analyzer_for(tool_response(json!({
            "candidateName": "John Roe",
            "matchScore": 0,
            "matchedSkills": [],
            "missingSkills": ["Everything"],
            "summary": "Unrelated background."
        })))
        .await;

        let outcome = analyzer.analyze("Rust engineer", &pdf_file("john.pdf")).await;
        assert!(outcome.is_completed());
        assert_eq!(outcome.result().match_score, 0);
    }

    #[tokio::test]
    async fn test_analyze_schema_violation_returns_sentinel() {
        let (_server, analyzer) = analyzer_for(tool_response(json!({
            "candidateName": "Jane Doe",
            "matchScore": 86
        })))
        .await;

        let outcome = analyzer.analyze("Rust engineer", &pdf_file("jane.pdf")).await;
        assert!(!outcome.is_completed());
        assert_eq!(outcome.result(), &AnalysisResult::sentinel("jane.pdf"));
    }

    #[tokio::test]
    async fn test_analyze_api_failure_returns_sentinel() {
        let (_server, analyzer) = analyzer_for(ResponseTemplate::new(500)).await;

        let outcome = analyzer.analyze("Rust engineer", &pdf_file("x.pdf")).await;
        let result = outcome.into_result();
        assert_eq!(result.match_score, 0);
        assert_eq!(result.summary, FAILED_ANALYSIS_SUMMARY);
        assert_eq!(result.filename, "x.pdf");
    }

    #[tokio::test]
    async fn test_analyze_unsupported_file_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let analyzer = LlmResumeAnalyzer(LlmClient::new("k".to_string(), server.uri()));

        let file = ResumeFile::new("cv.doc", "application/msword", Bytes::from_static(b"x"));
        let outcome = analyzer.analyze("Rust engineer", &file).await;
        assert!(matches!(outcome, AnalysisOutcome::Failed { ref reason, .. } if reason.contains("msword")));
    }
}
