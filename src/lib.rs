//! # md2pdf Library
//!
//! Converts Markdown documents into styled, paginated PDF files.
//! A conversion is one linear pipeline:
//!
//! - **Load**: read the Markdown source ([`source`])
//! - **Translate**: Markdown to HTML with a fixed set of extensions ([`markdown`], [`highlight`])
//! - **Resolve styles**: the built-in stylesheet plus an optional override ([`style`])
//! - **Wrap**: a minimal HTML document around the body ([`envelope`])
//! - **Render**: CSS cascade, layout and pagination, PDF serialization ([`emitter`])
//! - **Write**: the PDF bytes to their destination ([`writer`])
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2pdf::convert::{ConvertOptions, convert};
//!
//! let report = convert(&ConvertOptions::new("README.md")).expect("Failed to convert");
//! println!("Wrote {} pages to {}", report.page_count, report.output.display());
//! ```
//!
//! ## Modules
//!
//! - [`convert`] and [`builder`]: the pipeline and its fluent front end
//! - [`error`]: failure classification
//! - [`dom`], [`css`], [`selector`], [`cascade`]: HTML tree, stylesheets and computed styles
//! - [`inline`], [`table_renderer`], [`layout`]: line breaking, table sizing and pagination
//! - [`pdf_generator`], [`fonts`], [`fallback_font`], [`image`], [`compression`]: PDF objects and resources
//!
//! ## Examples
//!
//! ### Overriding styles
//!
//! ```rust,no_run
//! use md2pdf::builder::Converter;
//!
//! Converter::new("notes.md")
//!     .css("@page { size: letter; margin: 1in }")
//!     .convert()
//!     .expect("Failed to convert");
//! ```

pub mod builder;
pub mod cascade;
pub mod compression;
pub mod convert;
pub mod css;
pub mod dom;
pub mod emitter;
pub mod envelope;
pub mod error;
pub mod fallback_font;
pub mod fonts;
pub mod highlight;
pub mod image;
pub mod inline;
pub mod layout;
pub mod markdown;
pub mod pdf_generator;
pub mod selector;
pub mod source;
pub mod style;
pub mod table_renderer;
pub mod units;
pub mod writer;

pub use builder::Converter;
pub use convert::{ConversionReport, ConvertOptions, convert, default_output_path};
pub use error::{ConvertError, ErrorKind};
