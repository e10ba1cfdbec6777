//! # framecast-relay — Frame Export Relay
//!
//! Runs an [`framecast_core::ExportPipeline`] off a fixed-rate render
//! tick and ships frames to a UDP peer, to stdout as JSON lines, or
//! nowhere. With `--receive` it instead listens for UDP frames and
//! reports what arrives.
//!
//! The render source is a synthetic test pattern; embedding
//! applications drive `ExportPipeline` from their own render loop.

pub mod config;
pub mod service;
