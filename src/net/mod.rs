//! Remote script download
//!
//! A `Fetcher` downloads one URL into a local file and reports the transfer
//! status. The production fetcher is a reqwest client with rustls that follows
//! redirects.

pub mod http;

pub use http::{Fetcher, HttpFetcher};
