//! Output formatters for detection results.
//!
//! - [`json`]: the outcome as a JSON report for scripting
//! - [`text`]: a coloured human-readable summary
//!
//! # Example
//!
//! ```
//! use pdfdupe::duplicates::{DetectOptions, DetectionEngine};
//! use pdfdupe::error::ExitCode;
//! use pdfdupe::output::{JsonOutput, TextOutput};
//! use pdfdupe::registry::RawFile;
//!
//! let mut engine = DetectionEngine::new();
//! engine.register(vec![RawFile::new("a.pdf", b"x".to_vec())]);
//! let outcome = engine.detect(&DetectOptions::default()).unwrap();
//!
//! println!("{}", JsonOutput::new(&outcome, ExitCode::NoDuplicates).to_json_pretty().unwrap());
//! println!("{}", TextOutput::new(&outcome).render());
//! ```

pub mod json;
pub mod text;

pub use json::JsonOutput;
pub use text::TextOutput;
