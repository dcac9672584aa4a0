// src/lib.rs

pub mod analyze;
pub mod cache;
pub mod chart;
pub mod codes;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod record;
pub mod registry;
pub mod revision;
pub mod transform;

pub use error::{ParseWarning, Result, SourceError};
pub use pipeline::{DatasetView, LoadRequest, Pipeline};
pub use record::{RawRecord, Value};
