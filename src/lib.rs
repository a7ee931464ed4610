//! Competitor-shot image generator
//!
//! Turns a competitor product image into a composition prompt, fuses that
//! prompt with a description of the target product, and asks a multimodal
//! image model (reached through a proxy) to render the result.

pub mod ai;
pub mod error;
pub mod generator;
pub mod models;
pub mod prompts;
pub mod validation;

pub use error::{Error, Result};
pub use generator::{Generator, GeneratorServices};
