//! Virocoloc - VSV and Delta particle colocalization.
//!
//! Pairs of single-channel microscopy images are analysed in four steps:
//! - VSV objects are segmented by an external instance segmentation backend
//! - implausible VSV shapes are rejected by geometric thresholds
//! - Delta particles are detected as bright spots
//! - colocalization is measured in both directions
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use virocoloc::config::AnalysisConfig;
//! use virocoloc::image::TiffLoader;
//! use virocoloc::segmenter::LabelFileSegmenter;
//! use virocoloc::session::{NoPrompt, Session};
//!
//! let mut session = Session::new(
//!     AnalysisConfig::default(),
//!     Box::new(TiffLoader),
//!     Box::new(LabelFileSegmenter::new("cell_GREEN_masks.tif")),
//!     Box::new(NoPrompt),
//! );
//! session.load_data(Some("cell_GREEN.tif".into()), Some("cell_RED.tif".into()))?;
//! session.segment_vsv()?;
//! session.filter_vsv()?;
//! session.segment_delta()?;
//! println!("{:?}", session.colocalization()?);
//! ```

pub mod config;
pub mod error;
pub mod filters;
pub mod geometric_filter;
pub mod image;
pub mod mask;
pub mod overlap;
pub mod params;
pub mod segmenter;
pub mod session;
pub mod spot_detector;
pub mod store;

#[cfg(test)]
mod testing;


pub use error::{Error, Result};
