//! Core library for Puku, a sheet-music arrangement manager.
//!
//! An arrangement is one merged PDF plus metadata and a set of named parts,
//! each part a contiguous page range of the document. This crate covers the
//! whole lifecycle:
//!
//! - [`document`]: load, merge, and extract page ranges from PDFs
//! - [`selection`]: page selection state with range gestures
//! - [`db`]: SQLite persistence for arrangements and parts
//! - [`storage`]: object storage behind the [`storage::ObjectStore`] trait
//! - [`thumbnail`]: cached page previews with single-flight rendering
//! - [`upload`]: the staged upload pipeline and cascade deletion
//! - [`metadata`]: AI-assisted part detection
//!
//! Serving layers (HTTP, UI) live elsewhere and compose these pieces.

pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod metadata;
pub mod selection;
pub mod storage;
pub mod thumbnail;
pub mod upload;

pub use error::{Error, Result, StorageError};

#[cfg(test)]
pub(crate) mod test_support;
