//! Common test utilities and helpers.
//!
//! This module provides shared functionality for all tests, including:
//! - Custom assertions
//! - Test PDF builders
//! - Deterministic fakes for the recognizer, OCR engine and document

#![allow(dead_code)]

pub mod assertions;
pub mod fakes;
pub mod fixtures;
pub mod pdf_helpers;

pub use assertions::*;
pub use fakes::*;
pub use fixtures::*;
pub use pdf_helpers::*;
