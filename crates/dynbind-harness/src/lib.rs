//! Host probing for dynbind.
//!
//! This crate provides:
//! - Locate reports: what the locator would try for a set of names, ranked
//! - Probe reports: which library actually loads and which symbols it has
//!
//! Both are plain data with JSON output so CI jobs can diff them across
//! hosts. The `dynbind-harness` binary is a thin clap front end over them.

#![forbid(unsafe_code)]

pub mod report;

pub use report::{LocateReport, ProbeReport, ProbeRequest, ReportError};
