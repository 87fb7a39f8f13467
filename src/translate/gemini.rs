//! Gemini `generateContent` wire format.
//! Request: `{"contents":[{"parts":[{"text": prompt}]}]}`.
//! Response text lives at `candidates[0].content.parts[0].text`.

use reqwest::Url;
use serde::Deserialize;

use super::TranslateError;
use crate::config::ClientConfig;

/// Build the request body for a rendered prompt.
pub fn request_body(prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "contents": [{
            "parts": [{ "text": prompt }]
        }]
    })
}

/// `{endpoint}/{model}:generateContent?key={api_key}`
pub fn endpoint_url(config: &ClientConfig, api_key: &str) -> Result<Url, TranslateError> {
    let base = format!(
        "{}/{}:generateContent",
        config.endpoint.trim_end_matches('/'),
        config.model
    );
    Url::parse_with_params(&base, &[("key", api_key)])
        .map_err(|e| TranslateError::InvalidEndpoint(e.to_string()))
}

/// Endpoint without the query string, safe for logs.
pub fn redacted(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.to_string()
}

// --- Response types ---

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Extract the first generated text. Missing or empty text is malformed.
pub fn extract_text(body: &str) -> Result<String, TranslateError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| TranslateError::MalformedResponse(format!("invalid JSON: {e}")))?;

    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            TranslateError::MalformedResponse("candidates[0].content.parts[0].text missing".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_shape() {
        let body = request_body("Translate: hi");
        assert_eq!(
            body,
            serde_json::json!({"contents": [{"parts": [{"text": "Translate: hi"}]}]})
        );
    }

    #[test]
    fn url_carries_key_and_model() {
        let url = endpoint_url(&ClientConfig::default(), "a b&c").unwrap();
        assert_eq!(url.path(), "/v1beta/models/gemini-2.0-flash:generateContent");
        assert_eq!(url.query(), Some("key=a+b%26c"));
        assert!(!redacted(&url).contains("key="));
    }

    #[test]
    fn extracts_first_candidate_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"سلام"},{"text":"x"}]}},
                      {"content":{"parts":[{"text":"other"}]}}]}"#;
        assert_eq!(extract_text(body).unwrap(), "سلام");
    }

    #[test]
    fn missing_text_is_malformed() {
        for body in [
            r#"{}"#,
            r#"{"candidates":[]}"#,
            r#"{"candidates":[{"finishReason":"SAFETY"}]}"#,
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#,
            "not json",
        ] {
            assert!(
                matches!(extract_text(body), Err(TranslateError::MalformedResponse(_))),
                "{body}"
            );
        }
    }
}
