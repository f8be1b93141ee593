//! AI-assisted metadata extraction
//!
//! Sends an arrangement's PDF to an external extraction service and maps the
//! response onto the part repository. Extraction is best-effort: individual
//! parts with bad ranges or blank labels are skipped with a warning instead of
//! failing the whole batch.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db::{Part, PartRepository};
use crate::error::{Error, Result};

/// One part as reported by the extraction service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedPart {
    pub label: String,
    pub is_full_score: bool,
    pub start_page: u32,
    pub end_page: u32,
    pub category: Option<String>,
}

/// Full extraction result for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub title: String,
    pub composers: Vec<String>,
    pub arrangement_type: String,
    pub parts: Vec<ExtractedPart>,
}

/// Request to analyze a document.
#[derive(Debug, Clone)]
pub struct ExtractionRequest<'a> {
    pub pdf_bytes: &'a [u8],
    /// The service must pick `arrangement_type` from this list.
    pub existing_arrangement_types: &'a [String],
    pub additional_instructions: Option<&'a str>,
}

/// Collaborator seam for metadata extraction backends.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<ExtractedMetadata>;
}

/// Extractor that posts the document to an HTTP analysis endpoint as
/// base64-encoded JSON and expects an [`ExtractedMetadata`] response body.
pub struct HttpMetadataExtractor {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ExtractionPayload<'a> {
    document: String,
    mime_type: &'static str,
    existing_arrangement_types: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    additional_instructions: Option<&'a str>,
}

impl HttpMetadataExtractor {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl MetadataExtractor for HttpMetadataExtractor {
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<ExtractedMetadata> {
        let payload = ExtractionPayload {
            document: base64::engine::general_purpose::STANDARD.encode(request.pdf_bytes),
            mime_type: "application/pdf",
            existing_arrangement_types: request.existing_arrangement_types,
            additional_instructions: request.additional_instructions,
        };

        let mut http = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = http
            .send()
            .await
            .map_err(|e| Error::Metadata(format!("extraction request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Metadata(format!(
                "extraction service returned {}",
                response.status()
            )));
        }

        let metadata: ExtractedMetadata = response
            .json()
            .await
            .map_err(|e| Error::Metadata(format!("invalid extraction response: {}", e)))?;

        validate(&metadata)?;
        Ok(metadata)
    }
}

/// Reject responses missing the fields every downstream consumer relies on.
fn validate(metadata: &ExtractedMetadata) -> Result<()> {
    let mut missing = Vec::new();
    if metadata.title.trim().is_empty() {
        missing.push("title".to_string());
    }
    if metadata.composers.is_empty() {
        missing.push("composers".to_string());
    }
    if metadata.arrangement_type.trim().is_empty() {
        missing.push("arrangement_type".to_string());
    }
    if metadata.parts.is_empty() {
        missing.push("parts".to_string());
    }
    for (i, part) in metadata.parts.iter().enumerate() {
        if part.label.trim().is_empty() {
            missing.push(format!("parts[{}].label", i));
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Metadata(format!(
            "extraction response missing fields: {}",
            missing.join(", ")
        )))
    }
}

/// Create part records from an extraction result.
///
/// Parts the repository rejects (bad page ranges, blank labels) are skipped
/// with a warning; everything else propagates. Returns the parts that were
/// created, in input order.
pub async fn apply_extracted_parts(
    pool: &SqlitePool,
    arrangement_id: &str,
    metadata: &ExtractedMetadata,
) -> Result<Vec<Part>> {
    let repository = PartRepository::new(pool);
    let mut created = Vec::new();

    for extracted in &metadata.parts {
        let result = repository
            .create(
                arrangement_id,
                extracted.start_page,
                extracted.end_page,
                &extracted.label,
                extracted.category.as_deref(),
            )
            .await;

        match result {
            Ok(part) => created.push(part),
            Err(err @ (Error::InvalidRange { .. } | Error::Validation(_))) => {
                tracing::warn!(
                    arrangement_id,
                    label = %extracted.label,
                    start_page = extracted.start_page,
                    end_page = extracted.end_page,
                    %err,
                    "skipping extracted part"
                );
            }
            Err(err) => return Err(err),
        }
    }

    tracing::info!(
        arrangement_id,
        created = created.len(),
        reported = metadata.parts.len(),
        "applied extracted parts"
    );

    Ok(created)
}
