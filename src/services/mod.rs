//! Domain services used by the HTTP routes and the command line.
//!
//! ARCHITECTURE
//! ============
//! Service modules own file handling, extraction and reconciliation so route
//! handlers can stay focused on multipart parsing and response shapes.

pub mod csv_io;
pub mod extraction;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod statement;
pub mod storage;
