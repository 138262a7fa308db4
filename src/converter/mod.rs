//! Document converters
//!
//! The transformation itself is delegated to external tools; this module only
//! defines how the rest of the crate talks to them.
//!
//! ## Architecture
//!
//! The core abstraction is the [`Converter`] trait: a static
//! [`ConverterDescriptor`] plus a single async `transform(input, output)`.
//! Implementations provided:
//!
//! - [`MarkerConverter`]: PDF → Markdown via `marker_single`
//! - [`PandocConverter`]: Markdown → PDF via `pandoc`
//! - [`UnavailableConverter`]: stand-in when a tool is missing
//!
//! [`ConverterRegistry`] maps each [`ConversionMode`](crate::types::ConversionMode)
//! to one converter.
//!
//! ## Usage
//!
//! ```
//! use docshift::config::ConverterConfig;
//! use docshift::converter::ConverterRegistry;
//! use docshift::types::ConversionMode;
//!
//! let registry = ConverterRegistry::with_defaults(&ConverterConfig::default());
//! let converter = registry.resolve(&ConversionMode::PDF_TO_MD)?;
//! assert_eq!(converter.descriptor().output_extension, ".md");
//! # Ok::<(), docshift::Error>(())
//! ```

mod command;
mod marker;
mod pandoc;
mod registry;
mod traits;
mod unavailable;

pub use marker::MarkerConverter;
pub use pandoc::PandocConverter;
pub use registry::{ConverterRegistry, ModeCapability};
pub use traits::{Converter, ConverterCapabilities, ConverterDescriptor, ProgressReporter};
pub use unavailable::UnavailableConverter;
