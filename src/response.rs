use serde::{Deserialize, Serialize};

use crate::generation::GenerationResult;

/// JSON body the upstream answers with when it hosts the image itself.
#[derive(Deserialize)]
pub struct UpstreamResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub output: Vec<String>
}

impl UpstreamResponse {
    pub fn first_output(self) -> Option<String> {
        if !self.success {
            return None
        }

        self.output.into_iter().next()
    }
}

#[derive(Serialize)]
pub struct ProxyError {
    pub success: bool,
    pub message: String,
    pub error: String
}

#[derive(Serialize)]
pub struct PostResponse {
    pub success: bool,

    /// Ready to drop into an `<img src>`.
    pub src: String,

    #[serde(flatten)]
    pub image: ImagePayload
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImagePayload {
    Url {
        url: String
    },
    InlineImage {
        mime_type: String,
        data: String
    }
}

impl From<GenerationResult> for PostResponse {

    fn from(result: GenerationResult) -> Self {
        let src = result.image_src();
        let image = match result {
            GenerationResult::Url(url) => ImagePayload::Url { url },
            GenerationResult::InlineImage { bytes, mime_type } => ImagePayload::InlineImage {
                data: crate::generation::encode(&bytes),
                mime_type
            }
        };

        PostResponse {
            success: true,
            src,
            image
        }
    }

}
