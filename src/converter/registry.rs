//! Mode → converter lookup

use super::marker::MarkerConverter;
use super::pandoc::PandocConverter;
use super::traits::{Converter, ConverterDescriptor};
use super::unavailable::UnavailableConverter;
use crate::config::ConverterConfig;
use crate::error::{Error, Result};
use crate::types::ConversionMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// What a registered mode is backed by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeCapability {
    /// Conversion mode
    pub mode: ConversionMode,
    /// Converter implementation name (e.g. "pandoc", "unavailable")
    pub converter: String,
    /// Accepted input extension
    pub input_extension: String,
    /// Produced output extension
    pub output_extension: String,
    /// Whether a working tool backs the mode
    pub available: bool,
}

/// Registry of converters keyed by conversion mode
///
/// Lookups are pure: the registry is built once and shared read-only.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<ConversionMode, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in modes
    ///
    /// Each tool is taken from its configured path, or searched for in PATH
    /// when `search_path` is set. A missing tool leaves its mode registered
    /// with an [`UnavailableConverter`].
    pub fn with_defaults(config: &ConverterConfig) -> Self {
        let mut registry = Self::new();

        let marker = config
            .marker_path
            .clone()
            .map(MarkerConverter::new)
            .or_else(|| config.search_path.then(MarkerConverter::from_path).flatten());
        match marker {
            Some(marker) => {
                tracing::info!(path = %marker.binary_path().display(), "using marker for pdf-to-md");
                registry.register(Arc::new(marker.with_gpu(config.marker_use_gpu)));
            }
            None => {
                tracing::warn!("marker_single not found, pdf-to-md conversions will fail");
                registry.register(Arc::new(UnavailableConverter::new(
                    ConverterDescriptor::pdf_to_markdown(),
                    "marker_single",
                )));
            }
        }

        let pandoc = config
            .pandoc_path
            .clone()
            .map(PandocConverter::new)
            .or_else(|| config.search_path.then(PandocConverter::from_path).flatten());
        match pandoc {
            Some(pandoc) => {
                tracing::info!(path = %pandoc.binary_path().display(), "using pandoc for md-to-pdf");
                registry.register(Arc::new(
                    pandoc
                        .with_pdf_engine(config.pdf_engine.clone())
                        .with_main_font(config.pdf_font.clone()),
                ));
            }
            None => {
                tracing::warn!("pandoc not found, md-to-pdf conversions will fail");
                registry.register(Arc::new(UnavailableConverter::new(
                    ConverterDescriptor::markdown_to_pdf(),
                    "pandoc",
                )));
            }
        }

        registry
    }

    /// Register `converter` under its descriptor's mode, returning any converter it replaced
    pub fn register(&mut self, converter: Arc<dyn Converter>) -> Option<Arc<dyn Converter>> {
        let mode = converter.descriptor().mode.clone();
        tracing::debug!(mode = %mode, converter = converter.name(), "registered converter");
        self.converters.insert(mode, converter)
    }

    /// Converter for `mode`, or [`Error::UnsupportedMode`]
    pub fn resolve(&self, mode: &ConversionMode) -> Result<Arc<dyn Converter>> {
        self.converters
            .get(mode)
            .cloned()
            .ok_or_else(|| Error::UnsupportedMode(mode.clone()))
    }

    /// Descriptor for `mode`, or [`Error::UnsupportedMode`]
    pub fn descriptor(&self, mode: &ConversionMode) -> Result<ConverterDescriptor> {
        self.resolve(mode).map(|c| c.descriptor().clone())
    }

    /// Registered modes, sorted
    pub fn modes(&self) -> Vec<ConversionMode> {
        let mut modes: Vec<_> = self.converters.keys().cloned().collect();
        modes.sort();
        modes
    }

    /// Per-mode backing converter and availability, sorted by mode
    pub fn capabilities(&self) -> Vec<ModeCapability> {
        let mut capabilities: Vec<_> = self
            .converters
            .iter()
            .map(|(mode, converter)| {
                let descriptor = converter.descriptor();
                ModeCapability {
                    mode: mode.clone(),
                    converter: converter.name().to_string(),
                    input_extension: descriptor.input_extension.to_string(),
                    output_extension: descriptor.output_extension.to_string(),
                    available: converter.capabilities().available,
                }
            })
            .collect();
        capabilities.sort_by(|a, b| a.mode.cmp(&b.mode));
        capabilities
    }
}
