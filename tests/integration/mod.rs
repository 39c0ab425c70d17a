//! Integration tests for page-doc.
//!
//! These tests drive the inspector end to end with mock fetchers, mock
//! plugins and manifest files written to temporary directories.

pub mod inspector_tests;
pub mod output_tests;
pub mod registry_tests;
