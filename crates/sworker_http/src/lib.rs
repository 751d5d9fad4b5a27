//! HTTP value types shared by the worker crates.
//!
//! Requests and responses are plain snapshots (`FetchRequest`,
//! `FetchResponse`) so they can be cloned into cache partitions and handed
//! across tasks. Network access goes through the [`Fetcher`] trait.

mod fetch;
mod network;
mod origin;
mod remote;
mod request;
mod response;
pub mod responses;

pub use fetch::{FetchError, Fetcher};
pub use network::AppNetwork;
pub use origin::OriginFetcher;
pub use remote::RemoteFetcher;
pub use request::FetchRequest;
pub use response::FetchResponse;
