//! MCP Server implementation for the fal.ai server.
//!
//! This module provides the MCP server handler that exposes:
//! - `generate_image` tool for styled text-to-image generation
//! - `upscale_image` tool for 4x upscaling
//! - `search-and-replace` tool for mask-based inpainting
//! - Resources for styles and image sizes

use crate::handler::{
    DEFAULT_IMAGE_SIZE, EditedImage, FALLBACK_CONTENT_TYPE, FalHandler, ImageGenerateParams,
    ImageUpscaleParams, MAX_NUMBER_OF_IMAGES, MIN_NUMBER_OF_IMAGES, SearchReplaceParams,
    UPSCALE_FACTOR, VALID_IMAGE_SIZES, image_count, into_validation_error,
};
use crate::resources;
use crate::styles::{DEFAULT_STYLE, StyleRegistry};
use mcp_falai_common::config::Config;
use mcp_falai_common::error::Error;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    model::{
        CallToolResult, Content, JsonObject, ListResourcesResult, ListToolsResult,
        ReadResourceResult, ResourceContents, ServerCapabilities, ServerInfo, Tool,
    },
};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tool name for text-to-image generation.
pub const GENERATE_IMAGE_TOOL: &str = "generate_image";

/// Tool name for upscaling.
pub const UPSCALE_IMAGE_TOOL: &str = "upscale_image";

/// Tool name for inpainting.
pub const SEARCH_AND_REPLACE_TOOL: &str = "search-and-replace";

/// MCP Server for fal.ai image tools.
#[derive(Clone)]
pub struct FalServer {
    /// Handler for upstream calls
    handler: Arc<FalHandler>,
}

/// Tool parameters wrapper for generate_image.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateImageToolParams {
    /// Text description of the image to generate
    pub prompt: String,
    /// Visual style of the image (default: realistic)
    #[serde(default)]
    pub style: Option<String>,
    /// Number of images to generate (1-4, default: 1)
    #[serde(default)]
    #[schemars(with = "Option<u8>")]
    pub num_images: Option<serde_json::Number>,
    /// Image size preset (default: square_hd)
    #[serde(default)]
    pub size: Option<String>,
}

impl TryFrom<GenerateImageToolParams> for ImageGenerateParams {
    type Error = Error;

    fn try_from(params: GenerateImageToolParams) -> Result<Self, Error> {
        let num_images = match &params.num_images {
            Some(value) => image_count(value).map_err(|e| into_validation_error(vec![e]))?,
            None => 1,
        };

        Ok(Self {
            prompt: params.prompt,
            style: params
                .style
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_STYLE.to_string()),
            num_images,
            size: params
                .size
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_IMAGE_SIZE.to_string()),
        })
    }
}

/// Tool parameters wrapper for upscale_image.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpscaleImageToolParams {
    /// URL of the image to upscale
    pub image_url: String,
}

impl From<UpscaleImageToolParams> for ImageUpscaleParams {
    fn from(params: UpscaleImageToolParams) -> Self {
        Self {
            image_url: params.image_url,
        }
    }
}

/// Tool parameters wrapper for search-and-replace.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchReplaceToolParams {
    /// URL of the source image
    pub image_url: String,
    /// URL of the mask image; white areas are replaced, black areas kept
    pub mask_url: String,
    /// What to paint into the masked area
    pub prompt: String,
}

impl From<SearchReplaceToolParams> for SearchReplaceParams {
    fn from(params: SearchReplaceToolParams) -> Self {
        Self {
            image_url: params.image_url,
            mask_url: params.mask_url,
            prompt: params.prompt,
        }
    }
}

impl FalServer {
    /// Create a new FalServer with the given configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self, Error> {
        Ok(Self {
            handler: Arc::new(FalHandler::new(config)?),
        })
    }

    /// Run a tool by name.
    ///
    /// Every failure, including unknown tool names and malformed arguments,
    /// comes back as an error-flagged result with a single `Error: ` text entry.
    pub async fn dispatch(&self, name: &str, arguments: Option<JsonObject>) -> CallToolResult {
        info!(tool = %name, "Calling tool");

        match self.route(name, arguments).await {
            Ok(content) => CallToolResult::success(content),
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool call failed");
                CallToolResult::error(vec![Content::text(format!("Error: {}", e))])
            }
        }
    }

    async fn route(&self, name: &str, arguments: Option<JsonObject>) -> Result<Vec<Content>, Error> {
        match name {
            GENERATE_IMAGE_TOOL => self.generate_image(parse_arguments(arguments)?).await,
            UPSCALE_IMAGE_TOOL => self.upscale_image(parse_arguments(arguments)?).await,
            SEARCH_AND_REPLACE_TOOL => self.search_and_replace(parse_arguments(arguments)?).await,
            other => Err(Error::unknown_tool(other)),
        }
    }

    /// Generate images and report them as a summary plus a JSON payload.
    pub async fn generate_image(&self, params: GenerateImageToolParams) -> Result<Vec<Content>, Error> {
        let params = ImageGenerateParams::try_from(params)?;
        let style = params.style.clone();

        let result = self.handler.generate_image(params).await?;

        let summary = format!(
            "Successfully generated {} image(s) with style: {}",
            result.images.len(),
            style
        );
        let payload = serde_json::to_string_pretty(&result).map_err(|e| {
            Error::GenerationFailed(format!("Failed to serialize result: {}", e))
        })?;

        Ok(vec![Content::text(summary), Content::text(payload)])
    }

    /// Upscale an image by 4x.
    pub async fn upscale_image(&self, params: UpscaleImageToolParams) -> Result<Vec<Content>, Error> {
        let result = self.handler.upscale_image(params.into()).await?;

        Ok(vec![
            Content::text(format!("Successfully upscaled image by {}x", UPSCALE_FACTOR)),
            image_content(result),
        ])
    }

    /// Inpaint the masked region of an image.
    pub async fn search_and_replace(&self, params: SearchReplaceToolParams) -> Result<Vec<Content>, Error> {
        let result = self.handler.search_and_replace(params.into()).await?;

        Ok(vec![
            Content::text("Successfully processed image with inpainting"),
            image_content(result),
        ])
    }
}

fn image_content(image: EditedImage) -> Content {
    match image {
        EditedImage::Url(url) => Content::image(url, FALLBACK_CONTENT_TYPE),
        EditedImage::Base64 { data, mime_type } => Content::image(data, mime_type),
    }
}

/// Deserialize tool arguments; absent arguments read as an empty object.
fn parse_arguments<T: DeserializeOwned>(arguments: Option<JsonObject>) -> Result<T, Error> {
    let value = Value::Object(arguments.unwrap_or_default());
    serde_json::from_value(value).map_err(|e| Error::validation(format!("Invalid parameters: {}", e)))
}

fn schema_object<T: JsonSchema>() -> JsonObject {
    let schema = schema_for!(T);
    match serde_json::to_value(&schema).unwrap_or_default() {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

/// Merge `overrides` into one property of a generated schema.
fn refine_property(schema: &mut JsonObject, field: &str, overrides: Value) {
    let Some(Value::Object(properties)) = schema.get_mut("properties") else {
        return;
    };
    if let (Some(Value::Object(property)), Value::Object(overrides)) =
        (properties.get_mut(field), overrides)
    {
        property.remove("format");
        property.extend(overrides);
    }
}

fn generate_image_schema() -> JsonObject {
    let mut schema = schema_object::<GenerateImageToolParams>();
    refine_property(
        &mut schema,
        "style",
        json!({
            "type": "string",
            "enum": StyleRegistry::advertised(),
            "default": DEFAULT_STYLE,
        }),
    );
    refine_property(
        &mut schema,
        "num_images",
        json!({
            "type": "integer",
            "minimum": MIN_NUMBER_OF_IMAGES,
            "maximum": MAX_NUMBER_OF_IMAGES,
            "default": 1,
        }),
    );
    refine_property(
        &mut schema,
        "size",
        json!({
            "type": "string",
            "enum": VALID_IMAGE_SIZES,
            "default": DEFAULT_IMAGE_SIZE,
        }),
    );
    schema
}

fn tool(name: &'static str, description: &'static str, input_schema: JsonObject) -> Tool {
    Tool {
        name: Cow::Borrowed(name),
        description: Some(Cow::Borrowed(description)),
        input_schema: Arc::new(input_schema),
        annotations: None,
        icons: None,
        meta: None,
        output_schema: None,
        title: None,
    }
}

/// Tools served by [`FalServer`].
pub fn tools() -> Vec<Tool> {
    vec![
        tool(
            GENERATE_IMAGE_TOOL,
            "Generate images from a text prompt using fal.ai. \
             The style selects negative prompt cues and the number of diffusion steps. \
             Returns a summary and a JSON payload with image URLs, prompt, seed and NSFW flags.",
            generate_image_schema(),
        ),
        tool(
            UPSCALE_IMAGE_TOOL,
            "Upscale an image by 4x using fal.ai ESRGAN. Returns the upscaled image.",
            schema_object::<UpscaleImageToolParams>(),
        ),
        tool(
            SEARCH_AND_REPLACE_TOOL,
            "Replace part of an image using a mask and a prompt (fal.ai inpainting). \
             White areas of the mask are repainted according to the prompt, black areas are kept.",
            schema_object::<SearchReplaceToolParams>(),
        ),
    ]
}

impl ServerHandler for FalServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Image generation and editing server using fal.ai. \
                 Use generate_image to create images from text prompts in a chosen style, \
                 upscale_image to upscale an image by 4x, \
                 and search-and-replace to repaint the masked area of an image."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _params: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move {
            Ok(ListToolsResult {
                tools: tools(),
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn call_tool(
        &self,
        params: rmcp::model::CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move { Ok(self.dispatch(params.name.as_ref(), params.arguments).await) }
    }

    fn list_resources(
        &self,
        _params: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        async move {
            debug!("Listing resources");

            let styles_resource = rmcp::model::Resource {
                raw: rmcp::model::RawResource {
                    uri: resources::STYLES_URI.to_string(),
                    name: "Image Styles".to_string(),
                    title: None,
                    description: Some(
                        "Styles accepted by generate_image, with negative prompts and step counts"
                            .to_string(),
                    ),
                    mime_type: Some("application/json".to_string()),
                    size: None,
                    icons: None,
                    meta: None,
                },
                annotations: None,
            };

            let sizes_resource = rmcp::model::Resource {
                raw: rmcp::model::RawResource {
                    uri: resources::SIZES_URI.to_string(),
                    name: "Image Sizes".to_string(),
                    title: None,
                    description: Some("Image size presets for generate_image".to_string()),
                    mime_type: Some("application/json".to_string()),
                    size: None,
                    icons: None,
                    meta: None,
                },
                annotations: None,
            };

            Ok(ListResourcesResult {
                resources: vec![styles_resource, sizes_resource],
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn read_resource(
        &self,
        params: rmcp::model::ReadResourceRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            let uri = &params.uri;
            debug!(uri = %uri, "Reading resource");

            let content = resources::read(uri).ok_or_else(|| {
                McpError::resource_not_found(format!("Unknown resource: {}", uri), None)
            })?;

            Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(content, uri.clone())],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_server() -> FalServer {
        FalServer::new(Config::new("test-key")).unwrap()
    }

    fn tool_schema(name: &str) -> JsonObject {
        tools()
            .into_iter()
            .find(|t| t.name == name)
            .map(|t| (*t.input_schema).clone())
            .unwrap()
    }

    fn required(schema: &JsonObject) -> Vec<String> {
        let mut fields: Vec<String> = schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| r.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        fields.sort();
        fields
    }

    #[test]
    fn test_server_info() {
        let server = test_server();
        let info = server.get_info();
        assert!(info.instructions.unwrap().contains("search-and-replace"));
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_some());
    }

    #[test]
    fn test_tool_names() {
        let names: Vec<String> = tools().into_iter().map(|t| t.name.to_string()).collect();
        assert_eq!(names, vec!["generate_image", "upscale_image", "search-and-replace"]);
    }

    #[test]
    fn test_required_fields() {
        assert_eq!(required(&tool_schema(GENERATE_IMAGE_TOOL)), vec!["prompt"]);
        assert_eq!(required(&tool_schema(UPSCALE_IMAGE_TOOL)), vec!["image_url"]);
        assert_eq!(
            required(&tool_schema(SEARCH_AND_REPLACE_TOOL)),
            vec!["image_url", "mask_url", "prompt"]
        );
    }

    #[test]
    fn test_generate_schema_advertises_styles_and_sizes() {
        let schema = tool_schema(GENERATE_IMAGE_TOOL);
        let properties = schema["properties"].as_object().unwrap();

        let style = &properties["style"];
        assert_eq!(style["default"], "realistic");
        let styles = style["enum"].as_array().unwrap();
        assert_eq!(styles.len(), StyleRegistry::advertised().len());
        assert!(styles.iter().any(|s| s == "pixar-style"));

        let size = &properties["size"];
        assert_eq!(size["default"], "square_hd");
        assert_eq!(size["enum"].as_array().unwrap().len(), 6);

        let num_images = &properties["num_images"];
        assert_eq!(num_images["minimum"], 1);
        assert_eq!(num_images["maximum"], 4);
        assert!(num_images.get("format").is_none());
    }

    #[test]
    fn test_tool_params_conversion() {
        let tool_params = GenerateImageToolParams {
            prompt: "castle".to_string(),
            style: Some("oil-painting".to_string()),
            num_images: Some(2.into()),
            size: Some("landscape_16_9".to_string()),
        };

        let params = ImageGenerateParams::try_from(tool_params).unwrap();
        assert_eq!(params.prompt, "castle");
        assert_eq!(params.style, "oil-painting");
        assert_eq!(params.num_images, 2);
        assert_eq!(params.size, "landscape_16_9");
    }

    #[test]
    fn test_tool_params_defaults() {
        let tool_params = GenerateImageToolParams {
            prompt: "A cat".to_string(),
            style: None,
            num_images: Some(0.into()),
            size: Some(String::new()),
        };

        let params = ImageGenerateParams::try_from(tool_params).unwrap();
        assert_eq!(params.style, DEFAULT_STYLE);
        assert_eq!(params.num_images, 1);
        assert_eq!(params.size, DEFAULT_IMAGE_SIZE);
    }

    #[test]
    fn test_tool_params_accept_whole_float_counts() {
        let args = json!({"prompt": "a cat", "num_images": 2.0});
        let tool_params: GenerateImageToolParams = parse_arguments(args.as_object().cloned()).unwrap();

        let params = ImageGenerateParams::try_from(tool_params).unwrap();
        assert_eq!(params.num_images, 2);
    }

    #[test]
    fn test_tool_params_fractional_count_is_a_validation_error() {
        let args = json!({"prompt": "a cat", "num_images": 1.5});
        let tool_params: GenerateImageToolParams = parse_arguments(args.as_object().cloned()).unwrap();

        let err = ImageGenerateParams::try_from(tool_params).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("num_images must be a whole number"));
    }

    #[test]
    fn test_parse_arguments_missing_required_field() {
        let args = json!({"image_url": "http://x/y.png", "prompt": "dog"});
        let err = parse_arguments::<SearchReplaceToolParams>(args.as_object().cloned()).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("mask_url"));
    }

    #[test]
    fn test_parse_arguments_absent() {
        let err = parse_arguments::<GenerateImageToolParams>(None).unwrap_err();
        assert!(err.to_string().contains("prompt"));
    }

    #[test]
    fn test_image_content_url_uses_jpeg() {
        let content = image_content(EditedImage::Url("https://fal.media/a.png".to_string()));
        match &content.raw {
            rmcp::model::RawContent::Image(image) => {
                assert_eq!(image.data, "https://fal.media/a.png");
                assert_eq!(image.mime_type, "image/jpeg");
            }
            other => panic!("expected image content, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let result = test_server().dispatch("make_video", None).await;
        assert_eq!(result.is_error, Some(true));
        match &result.content[0].raw {
            rmcp::model::RawContent::Text(text) => {
                assert!(text.text.starts_with("Error: "));
                assert!(text.text.contains("Unknown tool"));
            }
            other => panic!("expected text content, got {:?}", other),
        }
    }
}
