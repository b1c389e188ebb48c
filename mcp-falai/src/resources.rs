//! MCP Resources for the fal.ai server.
//!
//! This module provides resource implementations for:
//! - `falai://styles` - Styles accepted by `generate_image`, with their policies
//! - `falai://sizes` - Image size presets

use crate::handler::{DEFAULT_IMAGE_SIZE, VALID_IMAGE_SIZES};
use crate::styles::{DEFAULT_STYLE, STYLE_POLICIES};
use serde::Serialize;

/// URI of the styles resource.
pub const STYLES_URI: &str = "falai://styles";

/// URI of the sizes resource.
pub const SIZES_URI: &str = "falai://sizes";

/// Information about a style family.
#[derive(Debug, Clone, Serialize)]
pub struct StyleInfo {
    /// Canonical style identifier
    pub id: &'static str,
    /// Other advertised names resolving to this style
    pub aliases: Vec<&'static str>,
    /// Negative cues appended to the prompt
    pub negative_prompt: &'static str,
    /// Diffusion steps requested upstream
    pub inference_steps: u32,
    /// Whether this is the default style
    pub is_default: bool,
}

/// Information about an image size preset.
#[derive(Debug, Clone, Serialize)]
pub struct SizeInfo {
    pub id: &'static str,
    pub is_default: bool,
}

/// List all style families.
pub fn list_styles() -> Vec<StyleInfo> {
    STYLE_POLICIES
        .iter()
        .map(|p| StyleInfo {
            id: p.id,
            aliases: p.aliases.to_vec(),
            negative_prompt: p.negative_prompt,
            inference_steps: p.inference_steps,
            is_default: p.id == DEFAULT_STYLE,
        })
        .collect()
}

/// List all image size presets.
pub fn list_sizes() -> Vec<SizeInfo> {
    VALID_IMAGE_SIZES
        .iter()
        .map(|&id| SizeInfo {
            id,
            is_default: id == DEFAULT_IMAGE_SIZE,
        })
        .collect()
}

/// Get styles resource as JSON string.
pub fn styles_resource_json() -> String {
    serde_json::to_string_pretty(&list_styles()).unwrap_or_else(|_| "[]".to_string())
}

/// Get sizes resource as JSON string.
pub fn sizes_resource_json() -> String {
    serde_json::to_string_pretty(&list_sizes()).unwrap_or_else(|_| "[]".to_string())
}

/// Resolve a resource URI to its JSON body.
pub fn read(uri: &str) -> Option<String> {
    match uri {
        STYLES_URI => Some(styles_resource_json()),
        SIZES_URI => Some(sizes_resource_json()),
        _ => None,
    }
}
