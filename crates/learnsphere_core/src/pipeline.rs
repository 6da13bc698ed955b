//! crates/learnsphere_core/src/pipeline.rs
//!
//! The generation pipeline: prompt construction, the ordered multi-model
//! fallback loop, response cleanup/validation, and the fixed mock payload
//! served when no real upstream result could be obtained.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::GenerationResult;
use crate::ports::TextGenerationService;

/// The ordered fallback chain of upstream model identifiers, tried in
/// sequence until one yields a usable result.
pub const DEFAULT_FALLBACK_CHAIN: &[&str] = &[
    "gemini-flash-latest",
    "gemini-pro-latest",
    "gemini-2.0-flash-exp",
    "gemini-flash-lite-latest",
];

/// How one attempt against one model identifier failed. Failures are
/// ordinary values here, not unwound exceptions; the loop advances to the
/// next candidate on any of them.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("upstream call failed: {0}")]
    UpstreamCall(String),
    #[error("response was not valid JSON: {0}")]
    Parse(String),
    #[error("response did not match the four-key contract: {0}")]
    Contract(String),
}

/// Builds a `GenerationResult` for a `(topic, level)` pair by calling an
/// injected model client across the fallback chain.
///
/// `model` is `None` when no API credential was configured at startup; in
/// that case every request short-circuits to the mock payload. The caller
/// cannot distinguish mock output from a real answer other than by content;
/// that ambiguity is a deliberate availability trade-off.
#[derive(Clone)]
pub struct GenerationPipeline {
    model: Option<Arc<dyn TextGenerationService>>,
    fallback_chain: Vec<String>,
}

impl GenerationPipeline {
    pub fn new(model: Option<Arc<dyn TextGenerationService>>, fallback_chain: Vec<String>) -> Self {
        Self {
            model,
            fallback_chain,
        }
    }

    /// Builds the single natural-language prompt sent to every candidate
    /// model. The response must be a JSON object with exactly the four
    /// `GenerationResult` keys.
    pub fn build_prompt(topic: &str, level: &str) -> String {
        format!(
            r#"You are an expert ML Learning Assistant.
The user is at the '{level}' level.
Explain the concept of '{topic}'.

Structure your response strictly as a JSON object with exactly these keys:
- explanation: A concise, clear explanation suitable for the user's level. Use Markdown for bolding key terms.
- code: A Python code snippet demonstrating the concept (use libraries like sklearn, tensorflow, or simple python logic).
- xray: A dictionary mapping line numbers (as strings, e.g. "1", "2") to a brief explanation of what that specific line does. Ensure the line numbers correspond exactly to the lines in the 'code' snippet.
- diagram: A Mermaid.js graph definition (e.g. graph LR, sequenceDiagram) to visualize the concept. RETURN ONLY THE MERMAID CODE TEXT, NO WRAPPER. IMPORTANT: Quote all node text to avoid syntax errors, e.g. A["Node Text"]. Do not use parentheses inside labels without quotes.

Make the explanation engaging and the code runnable. Ensure 'xray' covers key lines of the code."#
        )
    }

    /// Produces a `GenerationResult` for a non-empty topic. Never fails:
    /// when no credential is configured or every candidate model fails,
    /// the fixed mock payload is returned instead.
    pub async fn generate(&self, topic: &str, level: &str) -> GenerationResult {
        let Some(model) = &self.model else {
            warn!("no model credential configured; serving mock payload");
            return mock_result(topic);
        };

        let prompt = Self::build_prompt(topic, level);
        info!(topic, "starting generation");

        let mut last_failure: Option<AttemptError> = None;
        for name in &self.fallback_chain {
            match Self::attempt(model.as_ref(), name, &prompt).await {
                Ok(result) => {
                    info!(model = %name, "generation succeeded");
                    return result;
                }
                Err(e) => {
                    warn!(model = %name, error = %e, "generation attempt failed");
                    last_failure = Some(e);
                }
            }
        }

        match last_failure {
            Some(e) => warn!(error = %e, "all models failed; serving mock payload"),
            None => warn!("fallback chain is empty; serving mock payload"),
        }
        mock_result(topic)
    }

    async fn attempt(
        model: &dyn TextGenerationService,
        name: &str,
        prompt: &str,
    ) -> Result<GenerationResult, AttemptError> {
        let raw = model
            .generate_json(name, prompt)
            .await
            .map_err(|e| AttemptError::UpstreamCall(e.to_string()))?;

        let stripped = strip_code_fences(&raw);

        // Parse as untyped JSON first, then validate the key contract, so
        // that malformed text and a wrong shape fail as distinct kinds.
        let value: serde_json::Value =
            serde_json::from_str(&stripped).map_err(|e| AttemptError::Parse(e.to_string()))?;
        let mut result: GenerationResult =
            serde_json::from_value(value).map_err(|e| AttemptError::Contract(e.to_string()))?;

        result.diagram = clean_diagram(&result.diagram);
        Ok(result)
    }
}

/// Strips surrounding markdown code fences (```` ```json ````, ```` ``` ````)
/// from a raw model response before JSON parsing.
pub fn strip_code_fences(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    }
    if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim().to_string()
}

/// Removes leading ```` ```mermaid ````/```` ``` ```` and trailing ```` ``` ````
/// wrappers from a diagram definition, case-insensitively, so the client can
/// hand the text straight to its renderer.
pub fn clean_diagram(diagram: &str) -> String {
    let leading = Regex::new(r"(?i)^```(?:mermaid)?\s*").unwrap();
    let trailing = Regex::new(r"\s*```$").unwrap();

    let without_leading = leading.replace(diagram.trim(), "");
    let without_trailing = trailing.replace(&without_leading, "");
    without_trailing.trim().to_string()
}

/// The fixed placeholder payload returned when no real upstream result could
/// be obtained (missing credential, or every candidate failed).
pub fn mock_result(topic: &str) -> GenerationResult {
    let mut xray = BTreeMap::new();
    xray.insert(
        "1".to_string(),
        "Importing the numpy library for numerical operations.".to_string(),
    );
    xray.insert(
        "3".to_string(),
        "Printing a greeting message to the console.".to_string(),
    );
    xray.insert(
        "4".to_string(),
        "A comment indicating where real code would be.".to_string(),
    );

    GenerationResult {
        explanation: format!(
            "**{topic}** (Mock Generated Explanation).\n\nSince the API key is missing or an \
             error occurred, this is a placeholder. \n\nMachine learning is a field of inquiry \
             devoted to understanding and building methods that 'learn', that is, methods that \
             leverage data to improve performance on some set of tasks."
        ),
        code: format!(
            "# Example code for {topic}\nimport numpy as np\n\nprint('Hello from the mock \
             backend!')\n# Real code would be generated here."
        ),
        xray,
        diagram: "graph LR\n    A[Input] --> B{Process}\n    B -->|Success| C[Output]\n    B -->|Error| D[Fallback]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A scripted fake model: pops one canned response per call and records
    /// the model names it was invoked with.
    struct ScriptedModel {
        responses: Mutex<VecDeque<PortResult<String>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<PortResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerationService for ScriptedModel {
        async fn generate_json(&self, model: &str, _prompt: &str) -> PortResult<String> {
            self.calls.lock().unwrap().push(model.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PortError::Unexpected("no scripted response".into())))
        }
    }

    fn valid_payload() -> String {
        r#"{
            "explanation": "**Gradient descent** walks downhill.",
            "code": "import numpy as np\nprint('step')",
            "xray": {"1": "import numpy", "2": "print one step"},
            "diagram": "graph LR\n    A[\"Start\"] --> B[\"Minimum\"]"
        }"#
        .to_string()
    }

    fn chain(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prompt_mentions_topic_and_level() {
        let prompt = GenerationPipeline::build_prompt("Linear Regression", "Advanced");
        assert!(prompt.contains("'Linear Regression'"));
        assert!(prompt.contains("'Advanced'"));
        assert!(prompt.contains("explanation"));
        assert!(prompt.contains("xray"));
    }

    #[test]
    fn strips_json_fence_wrapper() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn cleans_diagram_fences_case_insensitively() {
        assert_eq!(clean_diagram("```mermaid\ngraph LR\n```"), "graph LR");
        assert_eq!(clean_diagram("```MERMAID\ngraph LR\n```"), "graph LR");
        assert_eq!(clean_diagram("```\ngraph LR\n```"), "graph LR");
        assert_eq!(clean_diagram("graph LR"), "graph LR");
    }

    #[test]
    fn mock_payload_interpolates_topic() {
        let mock = mock_result("Backprop");
        assert!(mock.explanation.contains("Backprop"));
        assert!(mock.explanation.contains("Mock Generated"));
        assert!(!mock.diagram.contains("```"));
    }

    #[tokio::test]
    async fn missing_credential_short_circuits_to_mock() {
        let pipeline = GenerationPipeline::new(None, chain(&["model-a"]));
        let result = pipeline.generate("SVMs", "Beginner").await;
        assert!(result.explanation.contains("Mock Generated"));
    }

    #[tokio::test]
    async fn first_success_short_circuits_remaining_candidates() {
        let model = ScriptedModel::new(vec![Ok(valid_payload()), Ok(valid_payload())]);
        let pipeline = GenerationPipeline::new(
            Some(model.clone()),
            chain(&["model-a", "model-b"]),
        );

        let result = pipeline.generate("Gradient Descent", "Beginner").await;
        assert!(result.explanation.contains("Gradient descent"));
        assert_eq!(model.calls(), vec!["model-a"]);
    }

    #[tokio::test]
    async fn upstream_failure_advances_to_next_candidate() {
        let model = ScriptedModel::new(vec![
            Err(PortError::Unexpected("quota exceeded".into())),
            Ok(valid_payload()),
        ]);
        let pipeline = GenerationPipeline::new(
            Some(model.clone()),
            chain(&["model-a", "model-b"]),
        );

        let result = pipeline.generate("Gradient Descent", "Beginner").await;
        assert!(result.explanation.contains("Gradient descent"));
        assert_eq!(model.calls(), vec!["model-a", "model-b"]);
    }

    #[tokio::test]
    async fn unparseable_json_advances_to_next_candidate() {
        let model = ScriptedModel::new(vec![
            Ok("this is not json".to_string()),
            Ok(valid_payload()),
        ]);
        let pipeline = GenerationPipeline::new(
            Some(model.clone()),
            chain(&["model-a", "model-b"]),
        );

        let result = pipeline.generate("PCA", "Beginner").await;
        assert!(result.explanation.contains("Gradient descent"));
        assert_eq!(model.calls(), vec!["model-a", "model-b"]);
    }

    #[tokio::test]
    async fn contract_violation_advances_to_next_candidate() {
        // Valid JSON, but missing the `diagram` key.
        let short_payload = r#"{
            "explanation": "x",
            "code": "y",
            "xray": {}
        }"#;
        let model = ScriptedModel::new(vec![
            Ok(short_payload.to_string()),
            Ok(valid_payload()),
        ]);
        let pipeline = GenerationPipeline::new(
            Some(model.clone()),
            chain(&["model-a", "model-b"]),
        );

        let result = pipeline.generate("PCA", "Beginner").await;
        assert!(result.explanation.contains("Gradient descent"));
        assert_eq!(model.calls(), vec!["model-a", "model-b"]);
    }

    #[tokio::test]
    async fn all_failures_fall_back_to_mock() {
        let model = ScriptedModel::new(vec![
            Err(PortError::Unexpected("down".into())),
            Ok("{ broken".to_string()),
        ]);
        let pipeline = GenerationPipeline::new(
            Some(model.clone()),
            chain(&["model-a", "model-b"]),
        );

        let result = pipeline.generate("k-means", "Intermediate").await;
        assert!(result.explanation.contains("Mock Generated"));
        assert!(result.explanation.contains("k-means"));
        assert_eq!(model.calls(), vec!["model-a", "model-b"]);
    }

    #[tokio::test]
    async fn fenced_response_with_fenced_diagram_is_normalized() {
        let fenced = format!(
            "```json\n{}\n```",
            r#"{
                "explanation": "x",
                "code": "y",
                "xray": {"1": "z"},
                "diagram": "```mermaid\ngraph TD\n    A[\"Q\"] --> B[\"R\"]\n```"
            }"#
        );
        let model = ScriptedModel::new(vec![Ok(fenced)]);
        let pipeline = GenerationPipeline::new(Some(model), chain(&["model-a"]));

        let result = pipeline.generate("Trees", "Beginner").await;
        assert!(result.diagram.starts_with("graph TD"));
        assert!(!result.diagram.contains("```"));
    }
}
