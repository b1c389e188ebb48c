//! fal.ai request handler for the MCP server.
//!
//! This module provides the `FalHandler` struct and parameter types for
//! text-to-image generation, 4x upscaling and mask-based inpainting against
//! fal.ai's synchronous model endpoints.

use crate::styles::{DEFAULT_STYLE, StyleRegistry};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use mcp_falai_common::config::Config;
use mcp_falai_common::error::{ConfigError, Error};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Text-to-image model.
pub const GENERATION_MODEL: &str = "fal-ai/flux/dev";

/// Upscaling model.
pub const UPSCALE_MODEL: &str = "fal-ai/esrgan";

/// Inpainting model endpoint.
pub const INPAINT_MODEL: &str = "fal-ai/inpaint";

/// Checkpoint the inpainting endpoint is asked to run.
pub const INPAINT_MODEL_NAME: &str = "diffusers/stable-diffusion-xl-1.0-inpainting-0.1";

/// Upscale factor requested from the upscaling model.
pub const UPSCALE_FACTOR: u32 = 4;

/// Media type assumed when the upstream does not report one.
pub const FALLBACK_CONTENT_TYPE: &str = "image/jpeg";

/// Valid image sizes for generation.
pub const VALID_IMAGE_SIZES: &[&str] = &[
    "square",
    "square_hd",
    "portrait_4_3",
    "portrait_16_9",
    "landscape_4_3",
    "landscape_16_9",
];

/// Default image size.
pub const DEFAULT_IMAGE_SIZE: &str = "square_hd";

/// Minimum number of images that can be generated.
pub const MIN_NUMBER_OF_IMAGES: u8 = 1;

/// Maximum number of images that can be generated.
pub const MAX_NUMBER_OF_IMAGES: u8 = 4;

/// Validation error details for tool parameters.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Interpret a JSON number as an image count.
///
/// Whole numbers are accepted in integer or float form (`2` and `2.0`).
/// `0` reads as "not set" and yields 1. The 1-4 bound is left to
/// [`ImageGenerateParams::validate`].
pub fn image_count(value: &serde_json::Number) -> Result<u8, ValidationError> {
    let whole = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u8::MAX))
            .map(|f| f as u64)
    });

    match whole.map(u8::try_from) {
        Some(Ok(0)) => Ok(1),
        Some(Ok(count)) => Ok(count),
        _ => Err(ValidationError::new(
            "num_images",
            format!(
                "num_images must be a whole number between {} and {}, got {}",
                MIN_NUMBER_OF_IMAGES, MAX_NUMBER_OF_IMAGES, value
            ),
        )),
    }
}

pub(crate) fn into_validation_error(errors: Vec<ValidationError>) -> Error {
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    Error::validation(messages.join("; "))
}

fn require_non_empty(errors: &mut Vec<ValidationError>, field: &str, value: &str, label: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::new(field, format!("{} is required", label)));
    }
}

/// Text-to-image generation parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageGenerateParams {
    /// Text prompt describing the image to generate.
    pub prompt: String,

    /// Style id or alias; selects the negative prompt and step count.
    #[serde(default = "default_style")]
    pub style: String,

    /// Number of images to generate (1-4).
    #[serde(default = "default_num_images")]
    pub num_images: u8,

    /// Image size preset.
    #[serde(default = "default_size")]
    pub size: String,
}

fn default_style() -> String {
    DEFAULT_STYLE.to_string()
}

fn default_num_images() -> u8 {
    1
}

fn default_size() -> String {
    DEFAULT_IMAGE_SIZE.to_string()
}

impl ImageGenerateParams {
    /// Parameters with every option at its default.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            style: default_style(),
            num_images: default_num_images(),
            size: default_size(),
        }
    }

    /// Validate the parameters.
    ///
    /// # Returns
    /// - `Ok(())` if all parameters are valid
    /// - `Err(Vec<ValidationError>)` with all validation errors
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        require_non_empty(&mut errors, "prompt", &self.prompt, "Prompt");

        if StyleRegistry::resolve(&self.style).is_none() {
            errors.push(ValidationError::new(
                "style",
                format!(
                    "Unknown style '{}'. Valid options: {}",
                    self.style,
                    StyleRegistry::advertised().join(", ")
                ),
            ));
        }

        if self.num_images < MIN_NUMBER_OF_IMAGES || self.num_images > MAX_NUMBER_OF_IMAGES {
            errors.push(ValidationError::new(
                "num_images",
                format!(
                    "num_images must be between {} and {}, got {}",
                    MIN_NUMBER_OF_IMAGES, MAX_NUMBER_OF_IMAGES, self.num_images
                ),
            ));
        }

        if !VALID_IMAGE_SIZES.contains(&self.size.as_str()) {
            errors.push(ValidationError::new(
                "size",
                format!(
                    "Invalid size '{}'. Valid options: {}",
                    self.size,
                    VALID_IMAGE_SIZES.join(", ")
                ),
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Build the upstream request: prompt augmented with the style's negative
    /// cues, plus the style's step count.
    pub fn to_request(&self) -> Result<GenerationRequest, Error> {
        let policy = StyleRegistry::resolve(&self.style)
            .ok_or_else(|| Error::validation(format!("Unknown style: {}", self.style)))?;

        Ok(GenerationRequest {
            prompt: policy.augment_prompt(&self.prompt),
            num_inference_steps: policy.inference_steps,
            num_images: self.num_images,
            image_size: self.size.clone(),
        })
    }
}

/// Image upscaling parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageUpscaleParams {
    /// URL of the image to upscale.
    pub image_url: String,
}

impl ImageUpscaleParams {
    /// Validate the upscale parameters.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        require_non_empty(&mut errors, "image_url", &self.image_url, "Image URL");
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Mask-based inpainting parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchReplaceParams {
    /// URL of the source image.
    pub image_url: String,
    /// URL of the mask; white areas are repainted, black areas preserved.
    pub mask_url: String,
    /// Description of what to paint into the masked area.
    pub prompt: String,
}

impl SearchReplaceParams {
    /// Validate the inpainting parameters, reporting every missing field.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        require_non_empty(&mut errors, "image_url", &self.image_url, "Image URL");
        require_non_empty(&mut errors, "mask_url", &self.mask_url, "Mask URL");
        require_non_empty(&mut errors, "prompt", &self.prompt, "Prompt");
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// fal.ai request handler.
///
/// Holds the configuration and a shared HTTP client; every call is a single
/// request/response round trip with no state kept between calls.
pub struct FalHandler {
    /// Application configuration.
    pub config: Config,
    /// HTTP client for API requests, preconfigured with the request timeout.
    pub http: reqwest::Client,
}

impl FalHandler {
    /// Create a new FalHandler with the given configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    #[instrument(level = "debug", name = "fal_handler_new", skip_all)]
    pub fn new(config: Config) -> Result<Self, Error> {
        debug!(api_base = %config.api_base, timeout_secs = config.timeout_secs, "Initializing FalHandler");

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::invalid_value("HTTP client", e.to_string()))?;

        Ok(Self { config, http })
    }

    /// Generate images from a text prompt.
    ///
    /// # Returns
    /// * `Ok(GenerationResult)` - Normalized images plus echoed metadata
    /// * `Err(Error::Validation)` - Parameters rejected, no upstream call made
    /// * `Err(Error::GenerationFailed)` - Any failure of the upstream call
    #[instrument(level = "info", name = "generate_image", skip(self, params), fields(style = %params.style, size = %params.size, num_images = params.num_images))]
    pub async fn generate_image(&self, params: ImageGenerateParams) -> Result<GenerationResult, Error> {
        params.validate().map_err(into_validation_error)?;
        let request = params.to_request()?;

        info!(steps = request.num_inference_steps, "Generating image with fal.ai");

        self.run_generation(&request)
            .await
            .map_err(Error::generation_failed)
    }

    async fn run_generation(&self, request: &GenerationRequest) -> Result<GenerationResult, Error> {
        let response: GenerationResponse = self.post_json(GENERATION_MODEL, request).await?;

        let mut images = normalize_images(response.images);
        if self.config.embed_images {
            for image in &mut images {
                self.embed(image).await?;
            }
        }

        let has_nsfw_concepts = match response.has_nsfw_concepts {
            Some(flags) if flags.len() != images.len() => {
                warn!(
                    flags = flags.len(),
                    images = images.len(),
                    "Dropping NSFW flags that do not line up with the returned images"
                );
                None
            }
            other => other,
        };

        info!(count = images.len(), "Received images from fal.ai");

        Ok(GenerationResult {
            images,
            prompt: response.prompt.unwrap_or_else(|| request.prompt.clone()),
            seed: response.seed,
            has_nsfw_concepts,
        })
    }

    /// Upscale an image by a factor of four.
    #[instrument(level = "info", name = "upscale_image", skip_all)]
    pub async fn upscale_image(&self, params: ImageUpscaleParams) -> Result<EditedImage, Error> {
        params.validate().map_err(into_validation_error)?;

        info!(scale = UPSCALE_FACTOR, "Upscaling image with fal.ai");

        let request = UpscaleRequest {
            image_url: params.image_url,
            scale: UPSCALE_FACTOR,
        };
        let response: ImageEditResponse = self.post_json(UPSCALE_MODEL, &request).await?;
        self.finish_edit(response).await
    }

    /// Repaint the masked region of an image according to a prompt.
    #[instrument(level = "info", name = "search_and_replace", skip_all)]
    pub async fn search_and_replace(&self, params: SearchReplaceParams) -> Result<EditedImage, Error> {
        params.validate().map_err(into_validation_error)?;

        info!(model_name = INPAINT_MODEL_NAME, "Inpainting image with fal.ai");

        let request = InpaintRequest {
            model_name: INPAINT_MODEL_NAME.to_string(),
            prompt: params.prompt,
            image_url: params.image_url,
            mask_url: params.mask_url,
        };
        let response: ImageEditResponse = self.post_json(INPAINT_MODEL, &request).await?;
        self.finish_edit(response).await
    }

    async fn finish_edit(&self, response: ImageEditResponse) -> Result<EditedImage, Error> {
        let image = GeneratedImage::from(response.image);

        if self.config.embed_images {
            let (data, mime_type) = self.fetch_base64(&image.url).await?;
            return Ok(EditedImage::Base64 { data, mime_type });
        }

        Ok(EditedImage::Url(image.url))
    }

    /// POST a JSON body to a model endpoint and decode the JSON reply.
    async fn post_json<Req, Resp>(&self, model: &str, body: &Req) -> Result<Resp, Error>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let endpoint = self.config.endpoint(model);
        debug!(endpoint = %endpoint, "Calling fal.ai API");

        let response = self
            .http
            .post(&endpoint)
            .header("Authorization", format!("Key {}", self.config.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::from_request(&endpoint, e, self.config.timeout_secs))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::from_request(&endpoint, e, self.config.timeout_secs))?;

        if !status.is_success() {
            return Err(Error::api(&endpoint, status.as_u16(), text));
        }

        debug!(endpoint = %endpoint, response = %text, "fal.ai raw response");

        serde_json::from_str(&text).map_err(|e| {
            Error::api(&endpoint, status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    /// Replace an image's URL with an inline `data:` URL.
    async fn embed(&self, image: &mut GeneratedImage) -> Result<(), Error> {
        let (data, mime_type) = self.fetch_base64(&image.url).await?;
        image.url = format!("data:{};base64,{}", mime_type, data);
        image.content_type = mime_type;
        Ok(())
    }

    /// Download an image and return it base64-encoded with its media type.
    async fn fetch_base64(&self, url: &str) -> Result<(String, String), Error> {
        debug!(url = %url, "Fetching image for embedding");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::from_request(url, e, self.config.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::api(
                url,
                status.as_u16(),
                format!("Failed to fetch image: {}", status),
            ));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::from_request(url, e, self.config.timeout_secs))?;

        Ok((BASE64.encode(&bytes), mime_type))
    }
}

// =============================================================================
// API Request/Response Types
// =============================================================================

/// fal.ai text-to-image request.
#[derive(Debug, Serialize)]
pub struct GenerationRequest {
    /// Prompt with the style's negative cues appended
    pub prompt: String,
    /// Diffusion steps for the style
    pub num_inference_steps: u32,
    /// Number of images to generate
    pub num_images: u8,
    /// Size preset
    pub image_size: String,
}

/// fal.ai text-to-image response.
#[derive(Debug, Deserialize)]
pub struct GenerationResponse {
    /// Generated images, as bare URLs or image objects
    #[serde(default)]
    pub images: Vec<RawImage>,
    /// Prompt the model actually ran
    #[serde(default)]
    pub prompt: Option<String>,
    /// Seed used for generation
    #[serde(default)]
    pub seed: Option<u64>,
    /// Per-image NSFW detections
    #[serde(default)]
    pub has_nsfw_concepts: Option<Vec<bool>>,
}

/// An image entry as returned upstream.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawImage {
    /// Bare URL string
    Url(String),
    /// Object carrying a URL and optional metadata
    Object(RawImageObject),
}

/// Structured upstream image.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RawImageObject {
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// fal.ai upscale request.
#[derive(Debug, Serialize)]
pub struct UpscaleRequest {
    pub image_url: String,
    pub scale: u32,
}

/// fal.ai inpainting request.
#[derive(Debug, Serialize)]
pub struct InpaintRequest {
    pub model_name: String,
    pub prompt: String,
    pub image_url: String,
    pub mask_url: String,
}

/// Response shared by the upscale and inpainting endpoints.
#[derive(Debug, Deserialize)]
pub struct ImageEditResponse {
    pub image: RawImage,
}

// =============================================================================
// Result Types
// =============================================================================

/// A normalized generated image.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GeneratedImage {
    /// Remote URL, or a `data:` URL when images are embedded
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub content_type: String,
}

impl From<RawImage> for GeneratedImage {
    fn from(raw: RawImage) -> Self {
        match raw {
            RawImage::Url(url) => GeneratedImage {
                url,
                width: None,
                height: None,
                content_type: FALLBACK_CONTENT_TYPE.to_string(),
            },
            RawImage::Object(obj) => GeneratedImage {
                url: obj.url,
                width: obj.width,
                height: obj.height,
                content_type: obj
                    .content_type
                    .filter(|ct| !ct.is_empty())
                    .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string()),
            },
        }
    }
}

/// Normalize upstream image entries, preserving order and count.
pub fn normalize_images(raw: Vec<RawImage>) -> Vec<GeneratedImage> {
    raw.into_iter().map(GeneratedImage::from).collect()
}

/// Result of image generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub images: Vec<GeneratedImage>,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// One flag per image, index-aligned with `images`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_nsfw_concepts: Option<Vec<bool>>,
}

/// Result of an upscale or inpainting call.
#[derive(Debug, Clone, PartialEq)]
pub enum EditedImage {
    /// Remote URL of the result
    Url(String),
    /// Downloaded image (when embedding is enabled)
    Base64 { data: String, mime_type: String },
}


#[cfg(test)]
mod normalization_tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_generation_response_mixed_images() {
        let json = r#"{
            "images": [
                "https://fal.media/a.jpg",
                {"url": "https://fal.media/b.png", "content_type": "image/png", "width": 1024, "height": 768},
                {"url": "https://fal.media/c.webp"}
            ],
            "prompt": "a cat",
            "seed": 12345,
            "has_nsfw_concepts": [false, false, true]
        }"#;

        let response: GenerationResponse = serde_json::from_str(json).unwrap();
        let images = normalize_images(response.images);

        assert_eq!(images.len(), 3);
        assert_eq!(images[0].url, "https://fal.media/a.jpg");
        assert_eq!(images[0].content_type, FALLBACK_CONTENT_TYPE);
        assert_eq!(images[0].width, None);
        assert_eq!(images[1].content_type, "image/png");
        assert_eq!(images[1].width, Some(1024));
        assert_eq!(images[1].height, Some(768));
        assert_eq!(images[2].content_type, FALLBACK_CONTENT_TYPE);
        assert_eq!(response.seed, Some(12345));
        assert_eq!(response.has_nsfw_concepts, Some(vec![false, false, true]));
    }

    #[test]
    fn test_generation_response_without_optional_fields() {
        let response: GenerationResponse = serde_json::from_str(r#"{"images": []}"#).unwrap();
        assert!(response.images.is_empty());
        assert!(response.prompt.is_none());
        assert!(response.seed.is_none());
        assert!(response.has_nsfw_concepts.is_none());
    }

    #[test]
    fn test_image_object_without_url_is_rejected() {
        let result: Result<GenerationResponse, _> =
            serde_json::from_str(r#"{"images": [{"content_type": "image/png"}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_generated_image_serializes_wire_names() {
        let image = GeneratedImage {
            url: "https://fal.media/a.jpg".to_string(),
            width: None,
            height: Some(512),
            content_type: "image/jpeg".to_string(),
        };
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["url"], "https://fal.media/a.jpg");
        assert_eq!(json["content_type"], "image/jpeg");
        assert_eq!(json["height"], 512);
        assert!(json.get("width").is_none());
    }

    #[test]
    fn test_edit_response_accepts_object_image() {
        let response: ImageEditResponse = serde_json::from_str(
            r#"{"image": {"url": "https://fal.media/up.png", "content_type": "image/png", "file_size": 123}}"#,
        )
        .unwrap();
        assert_eq!(
            GeneratedImage::from(response.image).url,
            "https://fal.media/up.png"
        );
    }

    fn raw_image_strategy() -> impl Strategy<Value = RawImage> {
        let url = "https://fal\\.media/[a-z0-9]{1,12}\\.(png|jpg)";
        prop_oneof![
            url.prop_map(RawImage::Url),
            (
                url,
                proptest::option::of(prop_oneof![Just("image/png".to_string()), Just("image/webp".to_string())]),
                proptest::option::of(64u32..4096),
                proptest::option::of(64u32..4096),
            )
                .prop_map(|(url, content_type, width, height)| RawImage::Object(RawImageObject {
                    url,
                    content_type,
                    width,
                    height,
                })),
        ]
    }

    proptest! {
        /// Normalization preserves order and count; bare URLs get the
        /// fallback content type and objects keep the one they carry.
        #[test]
        fn normalization_preserves_order_and_metadata(raw in proptest::collection::vec(raw_image_strategy(), 0..8)) {
            let images = normalize_images(raw.clone());
            prop_assert_eq!(images.len(), raw.len());

            for (image, source) in images.iter().zip(raw.iter()) {
                match source {
                    RawImage::Url(url) => {
                        prop_assert_eq!(&image.url, url);
                        prop_assert_eq!(image.content_type.as_str(), FALLBACK_CONTENT_TYPE);
                    }
                    RawImage::Object(obj) => {
                        prop_assert_eq!(&image.url, &obj.url);
                        prop_assert_eq!(image.width, obj.width);
                        prop_assert_eq!(image.height, obj.height);
                        match &obj.content_type {
                            Some(ct) => prop_assert_eq!(&image.content_type, ct),
                            None => prop_assert_eq!(image.content_type.as_str(), FALLBACK_CONTENT_TYPE),
                        }
                    }
                }
            }
        }
    }
}
