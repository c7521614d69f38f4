//! BIO600 scan server
//!
//! Network service for the BIO600 multi-finger live-scan fingerprint
//! device: capture orchestration, multi-finger split decoding, template
//! creation and comparison, and a realtime preview channel.

pub mod capture;
pub mod device;
pub mod error;
pub mod models;
pub mod preview;
pub mod realtime_hub;
pub mod session;
pub mod split;
pub mod state;
pub mod template;
pub mod template_store;
pub mod web_api;

pub use error::{Error, Result};
