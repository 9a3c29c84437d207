//! CSV codec module.
//!
//! Converts uploaded text into a [`Dataset`](crate::types::Dataset) and back.
//! Splitting is deliberately naive: one record per line, one field per comma.

mod codec;

pub use codec::{load_upload, parse, serialize};
