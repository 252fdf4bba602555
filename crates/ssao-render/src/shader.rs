//! Shader assembly.
//!
//! Every pass shader is the shared `common.wgsl` prelude, any included
//! chunks, then the pass body. Variants are selected by constants prepended
//! to the source.

use std::fmt::Write as _;

use crate::error::{RenderError, RenderResult};

/// Shared structs and the fullscreen-triangle vertex stage.
pub const COMMON_WGSL: &str = include_str!("shaders/common.wgsl");

/// The obscurance estimator, shared by the occlusion pass and the debug overlay.
pub const OBSCURANCE_WGSL: &str = include_str!("shaders/obscurance.wgsl");

/// Builder for assembling a pass shader module.
pub struct ShaderBuilder {
    constants: Vec<(String, String)>,
    includes: Vec<&'static str>,
    body: Option<String>,
}

impl ShaderBuilder {
    /// Creates a new shader builder with the common prelude.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constants: Vec::new(),
            includes: vec![COMMON_WGSL],
            body: None,
        }
    }

    /// Appends a shared WGSL chunk after the ones already included.
    pub fn with_include(mut self, source: &'static str) -> Self {
        self.includes.push(source);
        self
    }

    /// Sets the pass body (WGSL).
    pub fn with_body(mut self, source: impl Into<String>) -> Self {
        self.body = Some(source.into());
        self
    }

    /// Declares a module-scope `const` ahead of all other source.
    pub fn with_constant(mut self, name: impl Into<String>, value: impl std::fmt::Display) -> Self {
        self.constants.push((name.into(), value.to_string()));
        self
    }

    /// The full WGSL source this builder produces.
    pub fn combined_source(&self) -> RenderResult<String> {
        let body = self
            .body
            .as_ref()
            .ok_or_else(|| RenderError::ShaderCompilationFailed("missing shader body".into()))?;

        let mut source = String::new();
        for (name, value) in &self.constants {
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(RenderError::ShaderCompilationFailed(format!(
                    "invalid constant name '{name}'"
                )));
            }
            let _ = writeln!(source, "const {name} = {value};");
        }
        for chunk in &self.includes {
            source.push_str(chunk);
            source.push_str("\n\n");
        }
        source.push_str(body);
        Ok(source)
    }
}

impl Default for ShaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
