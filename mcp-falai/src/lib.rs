//! fal.ai MCP Server Library
//!
//! This library exposes fal.ai image generation, 4x upscaling and mask-based
//! inpainting as MCP tools.

pub mod handler;
pub mod resources;
pub mod server;
pub mod styles;

pub use handler::{EditedImage, FalHandler, GeneratedImage, GenerationResult, ImageGenerateParams};
pub use server::FalServer;
pub use styles::{StylePolicy, StyleRegistry};
