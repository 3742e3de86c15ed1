use base64::{engine::general_purpose::STANDARD, Engine};

use crate::errors::GenerationError;

/// 1x1 transparent PNG. The upstream refuses requests without an image.
pub const PLACEHOLDER_PNG: [u8; 70] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64, 0xf8, 0xcf, 0x50,
    0x0f, 0x00, 0x03, 0x86, 0x01, 0x80, 0x5a, 0x34, 0x7d, 0x6b, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45,
    0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// A user supplied image, decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl SourceImage {
    /// Accepts `data:<mime>;base64,<data>` and nothing else.
    pub fn from_data_url(data_url: &str) -> Result<SourceImage, GenerationError> {
        let invalid = || GenerationError::Input("expected 'data:[mime-type];base64,[data]'".into());

        let (mime_type, data) = data_url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
            .ok_or_else(invalid)?;

        if mime_type.is_empty() || data.is_empty() {
            return Err(invalid())
        }

        let bytes = STANDARD
            .decode(data)
            .map_err(|err| GenerationError::Input(format!("image data is not valid base64: {}", err)))?;

        Ok(SourceImage {
            bytes,
            mime_type: mime_type.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    Reference,
    Logo,
    Placeholder,
}

impl ImageOrigin {
    pub fn file_name(&self) -> &'static str {
        match self {
            ImageOrigin::Reference => "reference.jpg",
            ImageOrigin::Logo => "logo.jpg",
            ImageOrigin::Placeholder => "placeholder.png",
        }
    }
}

/// The image that actually goes out in the `image` field.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImage {
    pub origin: ImageOrigin,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl PreparedImage {
    /// Reference image wins over the logo; with neither, the placeholder stands in.
    pub fn select(reference_image: Option<&SourceImage>, logo: Option<&SourceImage>) -> PreparedImage {
        let chosen = reference_image
            .map(|image| (ImageOrigin::Reference, image))
            .or_else(|| logo.map(|image| (ImageOrigin::Logo, image)));

        match chosen {
            Some((origin, image)) => PreparedImage {
                origin,
                bytes: image.bytes.clone(),
                mime_type: image.mime_type.clone(),
            },
            None => PreparedImage {
                origin: ImageOrigin::Placeholder,
                bytes: PLACEHOLDER_PNG.to_vec(),
                mime_type: "image/png".into(),
            },
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.origin == ImageOrigin::Placeholder
    }
}
