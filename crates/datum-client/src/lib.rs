//! datum-client - Client library for the datum REST API.
//!
//! This crate provides a client for interacting with a datum server.
//!
//! # Example
//!
//! ```ignore
//! use datum_client::{Datum, DatumClient};
//!
//! let client = DatumClient::new("http://localhost:8080")?;
//!
//! // Create a datum
//! let record = client.create(&Datum::new("temp", "celsius", "21.5", "a1b2")).await?;
//!
//! // Read the current revision
//! let latest = client.get_latest(record.action_hash()).await?;
//! ```

mod client;

pub use client::{DatumClient, HealthStatus};
pub use datum_core::types::{Action, ActionHash, Datum, Record, RecordDetails};
