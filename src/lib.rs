//! mqtt2jsonl - Record and replay MQTT message streams via JSON-Lines files
//!
//! Messages are captured with the delay since the previous one, so a
//! recording can later be published again at the rate it arrived or at a
//! fixed artificial rate.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod network;
pub mod recording;
pub mod replay;
pub mod storage;

pub use error::{Mqtt2JsonlError, Result};
