//! Result reporting and output.
//!
//! [`summarize`] computes the enriched count and success rate of a final
//! dataset. [`ResultWriter`] saves the enriched CSV under a dated file name
//! and, on request, a JSON [`RunReport`] next to it.
//!
//! # Example
//!
//! ```rust,ignore
//! use address_enricher::reporting::{ResultWriter, RunReport};
//!
//! let report = RunReport::from_outcome(&outcome, &mapping).with_input_file("data.csv");
//! println!("{}", serde_json::to_string_pretty(&report)?);
//!
//! let writer = ResultWriter::new("output", "enriched_addresses");
//! writer.write_csv(&outcome.dataset)?;
//! writer.write_report(&report)?;
//! ```

mod summary;
mod writer;

pub use summary::{EnrichmentSummary, is_enriched, summarize};
pub use writer::{BatchReport, ResultWriter, RunReport, output_file_name};
