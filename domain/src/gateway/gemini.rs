//! Gemini REST API client for embeddings, file uploads and document review.
//!
//! One client serves both the embedding and the analysis traits. Every call
//! authenticates with the `x-goog-api-key` header and is bounded by the
//! configured request timeout, so a stalled provider surfaces as
//! [`AiError::Timeout`].
use crate::error::{DomainErrorKind, Error, InternalErrorKind};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::*;
use review_ai::traits::{analysis, embedding};
use review_ai::{DocumentAnalysis, Error as AiError, FileHandle, Question, Upload};
use serde::Deserialize;
use serde_json::{json, Value};
use service::config::Config;
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Used when no analysis prompt is configured.
const DEFAULT_ANALYSIS_PROMPT: &str = "You are a legal assistant reviewing a contract for a \
company. Identify the title of the document and the name of the counterparty. List every \
conflict between the document and the company's policies below, naming the policy. List the \
legal and commercial risks, the clauses the document is missing with a suggested wording, \
concrete suggestions for improving the document and all payment terms with their due dates. \
Here are the company's policies and rules:\n\n";

const CHAT_INSTRUCTION: &str = "Answer the user's question clearly and concisely. Don't cite \
the document where it's not needed. Here are some rules which may be relevant to the \
question:\n ";

/// File resource as returned by the files endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFile {
    name: String,
    uri: String,
    #[serde(default)]
    mime_type: String,
}

impl From<GeminiFile> for FileHandle {
    fn from(file: GeminiFile) -> Self {
        FileHandle {
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: GeminiFile,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// The text parts of the first candidate, joined.
    fn text(self) -> Result<String, AiError> {
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(AiError::InvalidResponse(
                "Gemini returned no text".to_string(),
            ));
        }
        Ok(text)
    }
}

/// Gemini API client
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    embedding_model: String,
    embedding_dimensions: usize,
    analysis_model: String,
    analysis_prompt: String,
}

impl GeminiClient {
    /// Creates a client from the configuration. A missing API key is only
    /// reported when a call is made.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(config.ai_request_timeout_secs))
            .build()
            .map_err(|e| {
                warn!("Failed to build the Gemini HTTP client: {e:?}");
                Error {
                    source: Some(Box::new(e)),
                    error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
                }
            })?;

        if config.gemini_api_key().is_none() {
            warn!("GEMINI_API_KEY is not set; embedding and analysis calls will fail");
        }

        Ok(Self {
            client,
            api_key: config.gemini_api_key(),
            base_url: config.gemini_base_url().trim_end_matches('/').to_string(),
            embedding_model: config.embedding_model().to_string(),
            embedding_dimensions: config.embedding_dimensions,
            analysis_model: config.analysis_model().to_string(),
            analysis_prompt: analysis_prompt(config.initial_analysis_prompt()),
        })
    }

    fn api_key(&self) -> Result<&str, AiError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AiError::Configuration("GEMINI_API_KEY is not set".to_string()))
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{model}:{method}", self.base_url)
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &Value,
    ) -> Result<T, AiError> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, self.api_key()?)
            .json(body)
            .send()
            .await
            .map_err(request_error)?;
        parse(check(response).await?).await
    }

    async fn generate(
        &self,
        system_instruction: String,
        parts: Vec<Value>,
        json_output: bool,
    ) -> Result<String, AiError> {
        let mut body = json!({
            "system_instruction": { "parts": [{ "text": system_instruction }] },
            "contents": [{ "role": "user", "parts": parts }],
        });
        if json_output {
            body["generationConfig"] = json!({
                "responseMimeType": "application/json",
                "responseSchema": DocumentAnalysis::response_schema(),
            });
        }

        let url = self.model_url(&self.analysis_model, "generateContent");
        let response: GenerateResponse = self.post_json(&url, &body).await?;
        response.text()
    }
}

#[async_trait]
impl embedding::Provider for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        let body = json!({
            "model": format!("models/{}", self.embedding_model),
            "content": { "parts": [{ "text": text }] },
            "taskType": "SEMANTIC_SIMILARITY",
        });
        let url = self.model_url(&self.embedding_model, "embedContent");

        let response: EmbedResponse = self.post_json(&url, &body).await?;
        debug!(
            "Embedded {} characters into {} values",
            text.len(),
            response.embedding.values.len()
        );
        Ok(response.embedding.values)
    }

    fn dimensions(&self) -> usize {
        self.embedding_dimensions
    }

    fn provider_id(&self) -> &str {
        "gemini"
    }
}

#[async_trait]
impl analysis::Provider for GeminiClient {
    /// Resumable upload: one request to open the session, one to send the bytes.
    async fn upload(&self, upload: Upload) -> Result<FileHandle, AiError> {
        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header(API_KEY_HEADER, self.api_key()?)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header(
                "X-Goog-Upload-Header-Content-Length",
                upload.content.len().to_string(),
            )
            .header("X-Goog-Upload-Header-Content-Type", upload.mime_type.as_str())
            .json(&json!({ "file": { "display_name": upload.display_name } }))
            .send()
            .await
            .map_err(request_error)?;
        let start = check(start).await?;

        let session_url = start
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                AiError::InvalidResponse("Upload session has no upload URL".to_string())
            })?;

        let size = upload.content.len();
        let finish = self
            .client
            .post(session_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(upload.content)
            .send()
            .await
            .map_err(request_error)?;

        let uploaded: UploadResponse = parse(check(finish).await?).await?;
        info!("Uploaded {size} bytes to Gemini as {}", uploaded.file.name);
        Ok(uploaded.file.into())
    }

    async fn find_file(&self, name: &str) -> Result<Option<FileHandle>, AiError> {
        let response = self
            .client
            .get(format!("{}/v1beta/{name}", self.base_url))
            .header(API_KEY_HEADER, self.api_key()?)
            .send()
            .await
            .map_err(request_error)?;

        match check(response).await {
            Ok(response) => Ok(Some(parse::<GeminiFile>(response).await?.into())),
            Err(AiError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn analyze(
        &self,
        file: &FileHandle,
        rules_text: &str,
    ) -> Result<DocumentAnalysis, AiError> {
        let text = self
            .generate(
                format!("{}{rules_text}", self.analysis_prompt),
                vec![
                    file_part(file),
                    json!({ "text": "\n\n" }),
                    json!({ "text": "Analyze the document." }),
                ],
                true,
            )
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn ask(&self, question: Question) -> Result<String, AiError> {
        let mut parts = vec![file_part(&question.file), json!({ "text": "\n\n" })];
        if let Some(history) = &question.history {
            parts.push(json!({ "text": format!("Conversation so far:\n{history}\n\n") }));
        }
        parts.push(json!({ "text": question.question }));

        self.generate(
            format!("{CHAT_INSTRUCTION}{}", question.rules_text),
            parts,
            false,
        )
        .await
    }

    fn provider_id(&self) -> &str {
        "gemini"
    }
}

fn file_part(file: &FileHandle) -> Value {
    json!({ "file_data": { "mime_type": file.mime_type, "file_uri": file.uri } })
}

/// Decodes the configured prompt, falling back to the built-in one.
fn analysis_prompt(encoded: Option<&str>) -> String {
    let Some(encoded) = encoded else {
        return DEFAULT_ANALYSIS_PROMPT.to_string();
    };
    match STANDARD
        .decode(encoded.trim())
        .map_err(|e| e.to_string())
        .and_then(|bytes| String::from_utf8(bytes).map_err(|e| e.to_string()))
    {
        Ok(prompt) => prompt,
        Err(e) => {
            warn!("INITIAL_ANALYSIS_PROMPT is not valid base64 UTF-8 ({e}); using the built-in prompt");
            DEFAULT_ANALYSIS_PROMPT.to_string()
        }
    }
}

fn request_error(e: reqwest::Error) -> AiError {
    if e.is_timeout() {
        AiError::Timeout(e.to_string())
    } else {
        warn!("Gemini request failed: {e:?}");
        AiError::Network(e.to_string())
    }
}

/// Maps an unsuccessful status to the matching error.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, AiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after_seconds = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(60);
    let error_text = response.text().await.unwrap_or_default();
    warn!("Gemini API error {status}: {error_text}");

    Err(match status.as_u16() {
        401 | 403 => AiError::Authentication(error_text),
        404 => AiError::NotFound(error_text),
        429 => AiError::RateLimited {
            retry_after_seconds,
        },
        _ => AiError::Provider(format!("{status}: {error_text}")),
    })
}

async fn parse<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, AiError> {
    let body = response.text().await.map_err(request_error)?;
    serde_json::from_str(&body).map_err(|e| {
        warn!("Failed to parse Gemini response: {e:?}");
        AiError::Deserialization(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis::Provider as _;
    use clap::Parser;
    use embedding::Provider as _;
    use mockito::{Matcher, Server, ServerGuard};

    async fn setup_test_server() -> ServerGuard {
        Server::new_async().await
    }

    fn client(server_url: &str) -> GeminiClient {
        let config = Config::parse_from(["legalcheck", "--embedding-dimensions", "3"])
            .set_gemini_api_key("test-key".to_string())
            .set_gemini_base_url(server_url.to_string());
        GeminiClient::new(&config).unwrap()
    }

    fn contract() -> FileHandle {
        FileHandle {
            name: "files/abc".to_string(),
            uri: "https://files.test/files/abc".to_string(),
            mime_type: "text/plain".to_string(),
        }
    }

    #[tokio::test]
    async fn embed_requests_semantic_similarity_vectors() {
        let mut server = setup_test_server().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-embedding-exp-03-07:embedContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(json!({
                "content": { "parts": [{ "text": "Net 30" }] },
                "taskType": "SEMANTIC_SIMILARITY",
            })))
            .with_status(200)
            .with_body(r#"{"embedding":{"values":[0.1,0.2,0.3]}}"#)
            .create_async()
            .await;

        let gemini = client(&server.url());
        let values = gemini.embed("Net 30").await.unwrap();

        mock.assert_async().await;
        assert_eq!(values, vec![0.1, 0.2, 0.3]);
        assert_eq!(gemini.dimensions(), 3);
    }

    #[tokio::test]
    async fn error_statuses_are_classified() {
        let mut server = setup_test_server().await;
        let _limited = server
            .mock("POST", Matcher::Regex("embedContent".to_string()))
            .with_status(429)
            .with_header("retry-after", "12")
            .create_async()
            .await;
        let _denied = server
            .mock("POST", Matcher::Regex("generateContent".to_string()))
            .with_status(403)
            .with_body("API key not valid")
            .create_async()
            .await;

        let gemini = client(&server.url());

        assert!(matches!(
            gemini.embed("Net 30").await,
            Err(AiError::RateLimited {
                retry_after_seconds: 12
            })
        ));
        assert!(matches!(
            gemini.analyze(&contract(), "").await,
            Err(AiError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn missing_api_key_is_a_configuration_error() {
        let config = Config::parse_from(["legalcheck"])
            .set_gemini_base_url("http://127.0.0.1:1".to_string());
        let mut gemini = GeminiClient::new(&config).unwrap();
        gemini.api_key = None;

        assert!(matches!(
            gemini.embed("Net 30").await,
            Err(AiError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn upload_opens_a_session_then_finalizes() {
        let mut server = setup_test_server().await;
        let session_url = format!("{}/upload-session/1", server.url());
        let start = server
            .mock("POST", "/upload/v1beta/files")
            .match_header("x-goog-upload-protocol", "resumable")
            .match_header("x-goog-upload-command", "start")
            .match_header("x-goog-upload-header-content-length", "14")
            .match_header("x-goog-upload-header-content-type", "text/plain")
            .match_body(Matcher::Json(json!({ "file": { "display_name": "contract.txt" } })))
            .with_status(200)
            .with_header("x-goog-upload-url", &session_url)
            .create_async()
            .await;
        let finalize = server
            .mock("POST", "/upload-session/1")
            .match_header("x-goog-upload-command", "upload, finalize")
            .match_header("x-goog-upload-offset", "0")
            .match_body("Pay in 30 days")
            .with_status(200)
            .with_body(
                r#"{"file":{"name":"files/abc","uri":"https://files.test/files/abc","mimeType":"text/plain"}}"#,
            )
            .create_async()
            .await;

        let handle = client(&server.url())
            .upload(Upload {
                display_name: "contract.txt".to_string(),
                mime_type: "text/plain".to_string(),
                content: b"Pay in 30 days".to_vec(),
            })
            .await
            .unwrap();

        start.assert_async().await;
        finalize.assert_async().await;
        assert_eq!(handle, contract());
    }

    #[tokio::test]
    async fn find_file_treats_404_as_gone() {
        let mut server = setup_test_server().await;
        let _held = server
            .mock("GET", "/v1beta/files/abc")
            .with_status(200)
            .with_body(
                r#"{"name":"files/abc","uri":"https://files.test/files/abc","mimeType":"text/plain","state":"ACTIVE"}"#,
            )
            .create_async()
            .await;
        let _expired = server
            .mock("GET", "/v1beta/files/old")
            .with_status(404)
            .create_async()
            .await;

        let gemini = client(&server.url());

        assert_eq!(gemini.find_file("files/abc").await.unwrap(), Some(contract()));
        assert_eq!(gemini.find_file("files/old").await.unwrap(), None);
    }

    #[tokio::test]
    async fn analyze_asks_for_structured_output() {
        let mut server = setup_test_server().await;
        let findings = json!({
            "title": "Supply agreement",
            "company_name": "Globex",
            "conflicts": [],
            "risks": [{ "risk_type": "payment", "detail": "No late fee" }],
            "missing_clauses": [],
            "suggestions": [],
            "payment_terms": [],
        });
        let mock = server
            .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("Policy Name: Payments".to_string()),
                Matcher::PartialJson(json!({
                    "contents": [{ "role": "user", "parts": [
                        { "file_data": { "mime_type": "text/plain", "file_uri": "https://files.test/files/abc" } },
                        { "text": "\n\n" },
                        { "text": "Analyze the document." },
                    ]}],
                    "generationConfig": { "responseMimeType": "application/json" },
                })),
            ]))
            .with_status(200)
            .with_body(
                json!({ "candidates": [{ "content": { "parts": [{ "text": findings.to_string() }] } }] })
                    .to_string(),
            )
            .create_async()
            .await;

        let analysis = client(&server.url())
            .analyze(&contract(), "Policy Name: Payments")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(analysis.title.as_deref(), Some("Supply agreement"));
        assert_eq!(analysis.risks[0].detail, "No late fee");
    }

    #[tokio::test]
    async fn ask_sends_rules_and_history() {
        let mut server = setup_test_server().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("may be relevant to the question".to_string()),
                Matcher::Regex("Conversation so far:\\\\nUser: Who signs\\?".to_string()),
                Matcher::Regex("When is payment due\\?".to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"Within "},{"text":"30 days."}]}}]}"#)
            .create_async()
            .await;

        let answer = client(&server.url())
            .ask(Question {
                question: "When is payment due?".to_string(),
                file: contract(),
                rules_text: "Policy Name: Payments".to_string(),
                history: Some("User: Who signs?".to_string()),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(answer, "Within 30 days.");
    }

    #[test]
    fn configured_prompt_is_decoded() {
        assert_eq!(analysis_prompt(Some("UmV2aWV3IHRoaXMu")), "Review this.");
        assert_eq!(analysis_prompt(None), DEFAULT_ANALYSIS_PROMPT);
        assert_eq!(analysis_prompt(Some("%%%")), DEFAULT_ANALYSIS_PROMPT);
    }

    #[test]
    fn empty_candidates_are_invalid() {
        let response: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(response.text(), Err(AiError::InvalidResponse(_))));
    }
}
