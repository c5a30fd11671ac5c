//! MCP transport: the `classify_document` tool over stdio, using rmcp

use crate::classify::{ClassificationResult, Classifier, DocumentType};
use crate::source::{resolve_base64, resolve_path, resolve_url, ResolvedDocument, SourcePolicy};
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where to read one document from
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum DocumentSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the PDF file
        path: String,
    },
    /// Base64 encoded PDF data
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
    },
    /// URL to download the PDF from
    Url {
        /// URL of the PDF file
        url: String,
    },
}

const SOURCE_KEYS: [&str; 3] = ["path", "base64", "url"];

// Untagged derive gives useless errors; name the offending key instead
impl<'de> Deserialize<'de> for DocumentSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as _;

        let value = serde_json::Value::deserialize(deserializer)?;
        let Some(obj) = value.as_object() else {
            return Err(D::Error::custom(format!(
                "Invalid source: expected an object with one of {:?}, got {}",
                SOURCE_KEYS,
                json_kind(&value)
            )));
        };

        for key in SOURCE_KEYS {
            let Some(v) = obj.get(key) else { continue };
            let s = v
                .as_str()
                .ok_or_else(|| D::Error::custom(format!("\"{}\" must be a string", key)))?
                .to_string();
            return Ok(match key {
                "path" => DocumentSource::Path { path: s },
                "base64" => DocumentSource::Base64 { base64: s },
                _ => DocumentSource::Url { url: s },
            });
        }

        let keys: Vec<&String> = obj.keys().collect();
        Err(D::Error::custom(format!(
            "Invalid source: expected one of {:?}, got keys: {:?}",
            SOURCE_KEYS, keys
        )))
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Null => "null",
        serde_json::Value::Object(_) => "an object",
    }
}

impl DocumentSource {
    /// Name used in results and logs; base64 payloads are not echoed
    pub fn display_name(&self) -> String {
        match self {
            DocumentSource::Path { path } => path.clone(),
            DocumentSource::Base64 { .. } => "<base64>".to_string(),
            DocumentSource::Url { url } => url.clone(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ClassifyDocumentParams {
    /// Documents to classify
    pub sources: Vec<DocumentSource>,
}

/// Per-source outcome; exactly one of the classification or `error` is set
#[derive(Debug, Serialize)]
pub struct ClassifyDocumentResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<DocumentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClassifyDocumentResult {
    fn classified(source: String, result: ClassificationResult) -> Self {
        Self {
            source,
            document_type: Some(result.document_type),
            year: Some(result.year),
            error: None,
        }
    }

    fn failed(source: String, error: String) -> Self {
        Self {
            source,
            document_type: None,
            year: None,
            error: Some(error),
        }
    }
}

/// Tax document classifier MCP server
#[derive(Clone)]
pub struct ClassifierServer {
    tool_router: ToolRouter<Self>,
    classifier: Classifier,
    policy: Arc<SourcePolicy>,
}

#[tool_router]
impl ClassifierServer {
    pub fn new(classifier: Classifier, policy: SourcePolicy) -> Self {
        Self {
            tool_router: Self::tool_router(),
            classifier,
            policy: Arc::new(policy),
        }
    }

    /// Classify tax documents
    #[tool(
        description = "Classify tax documents as W2, 1040, 1099INT, 1099DIV, ID_CARD, HANDWRITTEN or OTHER and extract a best-effort date or year.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"url\": \"https://...\"}, or {\"base64\": \"...\"}"
    )]
    async fn classify_document(
        &self,
        Parameters(params): Parameters<ClassifyDocumentParams>,
    ) -> String {
        let results = self.classify_sources(&params.sources).await;
        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }
}

impl ClassifierServer {
    /// Classify each source in order; one failure does not abort the batch
    pub async fn classify_sources(&self, sources: &[DocumentSource]) -> Vec<ClassifyDocumentResult> {
        let mut results = Vec::with_capacity(sources.len());
        for source in sources {
            let name = source.display_name();
            let result = match self.process_source(source).await {
                Ok(classification) => ClassifyDocumentResult::classified(name, classification),
                Err(e) => {
                    tracing::warn!(source = %name, error = %e, "classify_document failed");
                    ClassifyDocumentResult::failed(name, e.client_message())
                }
            };
            results.push(result);
        }
        results
    }

    async fn process_source(&self, source: &DocumentSource) -> crate::error::Result<ClassificationResult> {
        let resolved = self.resolve_source(source).await?;
        let classifier = self.classifier.clone();
        let data = resolved.data;
        tokio::task::spawn_blocking(move || classifier.classify(&data)).await?
    }

    async fn resolve_source(&self, source: &DocumentSource) -> crate::error::Result<ResolvedDocument> {
        match source {
            DocumentSource::Path { path } => {
                let checked = self.policy.check_path(path)?;
                resolve_path(&checked)
            }
            DocumentSource::Base64 { base64 } => resolve_base64(base64),
            DocumentSource::Url { url } => resolve_url(url, &self.policy).await,
        }
    }
}

#[tool_handler]
impl ServerHandler for ClassifierServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Classifies tax documents (W-2, 1040, 1099-INT, 1099-DIV, identity cards, \
                 handwritten and other documents) supplied by path, URL or base64."
                    .into(),
            ),
        }
    }
}

/// Serve the MCP tool over stdio until the client disconnects
pub async fn run_mcp(classifier: Classifier, policy: SourcePolicy) -> anyhow::Result<()> {
    let server = ClassifierServer::new(classifier, policy);

    tracing::info!("MCP classifier ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
