//! Fault-tolerant HTTP client for a decentralized social network's hub
//! nodes: failover across an ordered endpoint list, rate-limit awareness,
//! and pagination helpers. The wire types in [`wire`] are the raw JSON the
//! hub returns; turning them into this system's internal records is the
//! message decoder's job, not this crate's.

mod client;
mod error;
pub mod wire;

pub use client::{HubClient, HubClientSettings, HubEndpoint};
pub use error::HubError;
