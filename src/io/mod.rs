//! Input/output helpers.
//!
//! - device JSON read/write (`device_file`)
//! - CSV ingest + validation (`ingest`)
//! - CSV exports (`export`)
//! - fit report JSON (`fit_report`)

pub mod device_file;
pub mod export;
pub mod fit_report;
pub mod ingest;

pub use device_file::*;
pub use export::*;
pub use fit_report::*;
pub use ingest::*;
