pub mod image;

use base64::{engine::general_purpose::STANDARD, Engine};
use hyper::StatusCode;
use reqwest::{header::CONTENT_TYPE, multipart::{Form, Part}, Client};
use tracing::{debug, error, info};

use crate::{config::GeneratorConfig, errors::GenerationError, prompt::AspectRatio, response::UpstreamResponse};
pub use image::{ImageOrigin, PreparedImage, SourceImage};

/// Fixed `sub_type` the upstream expects on every request.
pub const SUB_TYPE: &str = "2";

/// Sent when no known aspect ratio was picked.
pub const MATCH_INPUT_IMAGE: &str = "match_input_image";

/// Anything smaller than this is an error page wearing an image content type.
pub const MIN_IMAGE_BYTES: usize = 1000;

const SNIPPET_CHARS: usize = 200;

pub struct GenerationRequest {
    pub prompt: String,
    pub reference_image: Option<SourceImage>,
    pub logo: Option<SourceImage>,
    pub aspect_ratio: Option<AspectRatio>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    Url(String),
    InlineImage { bytes: Vec<u8>, mime_type: String },
}

impl GenerationResult {
    pub fn image_src(&self) -> String {
        match self {
            GenerationResult::Url(url) => url.clone(),
            GenerationResult::InlineImage { bytes, mime_type } => {
                format!("data:{};base64,{}", mime_type, encode(bytes))
            }
        }
    }
}

/// Fields of one upstream request, ready to be encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub image: PreparedImage,
    pub prompt: String,
    pub aspect_ratio: &'static str,
}

impl GenerationRequest {
    pub fn prepare(&self) -> PreparedRequest {
        let image = PreparedImage::select(self.reference_image.as_ref(), self.logo.as_ref());

        let prompt = if image.is_placeholder() {
            format!("Create a professional hiring post image from scratch with the following design: {}", self.prompt)
        } else {
            format!("Transform this image into a professional hiring post design. {}", self.prompt)
        };

        PreparedRequest {
            image,
            prompt,
            aspect_ratio: aspect_ratio_token(self.aspect_ratio),
        }
    }
}

impl PreparedRequest {
    pub fn into_form(self) -> Result<Form, GenerationError> {
        let image = Part::bytes(self.image.bytes)
            .file_name(self.image.origin.file_name())
            .mime_str(&self.image.mime_type)
            .map_err(|err| GenerationError::Input(format!("unusable image type {}: {}", self.image.mime_type, err)))?;

        Ok(Form::new()
            .part("image", image)
            .text("prompt", self.prompt)
            .text("sub_type", SUB_TYPE)
            .text("aspect_ratio", self.aspect_ratio))
    }
}

pub fn aspect_ratio_token(aspect_ratio: Option<AspectRatio>) -> &'static str {
    aspect_ratio
        .map(|ratio| ratio.as_str())
        .unwrap_or(MATCH_INPUT_IMAGE)
}

/// Talks to the image generation service through the forwarding endpoint.
#[derive(Clone)]
pub struct GenerationClient {
    config: GeneratorConfig,
    client: Client,
}

impl GenerationClient {
    pub fn new(config: GeneratorConfig, client: Client) -> GenerationClient {
        GenerationClient { config, client }
    }

    /// One POST, no retry. Any failure aborts the whole generation.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, GenerationError> {
        let prepared = request.prepare();
        info!(
            "Sending generation request to {} (image: {:?}, aspect_ratio: {}, prompt_length: {})",
            self.config.endpoint,
            prepared.image.origin,
            prepared.aspect_ratio,
            prepared.prompt.len()
        );

        let form = prepared.into_form()?;
        let response = self.client.post(self.config.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                error!("Could not reach {}: {}", self.config.endpoint, err);
                GenerationError::Transport(err)
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        debug!("Received response: status {}, content type {:?}", status, content_type);

        let body = response.bytes().await?;
        let result = interpret_response(status, &content_type, &body);
        match &result {
            Ok(GenerationResult::Url(url)) => info!("Generation finished with image URL {}", url),
            Ok(GenerationResult::InlineImage { bytes, mime_type }) => {
                info!("Generation finished with inline image ({} bytes, {})", bytes.len(), mime_type)
            }
            Err(err) => error!("Generation failed: {}", err),
        }

        result
    }
}

pub fn interpret_response(status: StatusCode, content_type: &str, body: &[u8]) -> Result<GenerationResult, GenerationError> {
    if !status.is_success() {
        return Err(GenerationError::Protocol(format!(
            "upstream returned {}: {}",
            status.as_u16(),
            snippet(body)
        )))
    }

    if content_type.contains("application/json") {
        let json: serde_json::Value = serde_json::from_slice(body)
            .map_err(|err| GenerationError::Protocol(format!("malformed JSON ({}): {}", err, snippet(body))))?;
        let raw = json.to_string();

        return serde_json::from_value::<UpstreamResponse>(json)
            .ok()
            .and_then(UpstreamResponse::first_output)
            .map(GenerationResult::Url)
            .ok_or_else(|| GenerationError::Protocol(format!("no output image found. Response: {}", raw)))
    }

    if body.len() < MIN_IMAGE_BYTES {
        return Err(GenerationError::Protocol(format!(
            "invalid response (too small: {} bytes). Response: {}",
            body.len(),
            snippet(body)
        )))
    }

    let mime_type = match content_type.split(';').next().map(str::trim) {
        Some(mime_type) if !mime_type.is_empty() => mime_type.to_string(),
        _ => "image/png".to_string(),
    };

    Ok(GenerationResult::InlineImage {
        bytes: body.to_vec(),
        mime_type,
    })
}

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn snippet(body: &[u8]) -> String {
    String::from_utf8_lossy(body).chars().take(SNIPPET_CHARS).collect()
}
