//! Core library for the SkyPortal spectra listener
//!
//! This crate provides the pieces of the classification daemon:
//! - Broker (SkyPortal) REST client
//! - Wavelength-grid normalization of raw spectra
//! - 1-D CNN classification via tract-onnx
//! - Durable dedup ledger of processed spectrum IDs
//! - The poll loop tying them together
//! - Result reporters (local log + chart, broker comments)

pub mod broker;
pub mod classifier;
pub mod error;
pub mod ledger;
pub mod models;
pub mod monitor;
pub mod normalize;
pub mod report;

pub use error::ListenerError;
pub use models::{Classification, LabelScore, SourceInfo, Spectrum, SpectrumSummary};
