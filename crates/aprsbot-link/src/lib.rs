//! # aprsbot link
//!
//! Connection to the **APRS-IS** packet network.
//!
//! The crate provides:
//!
//! * [`PacketLink`] — the transport seam consumed by the gateway: transmit
//!   a packet line, pull decoded inbound packets, close.
//! * [`AprsIsLink`] — TCP implementation with login, range filter and a
//!   serialized write path.
//! * [`connect_with_retry`] / [`RetryPolicy`] — exponential backoff for
//!   transient connection failures.
//! * [`AprsCredentials`] and [`RangeFilter`] — login parameters.
//! * [`LinkError`] — unified error type, split into retryable and fatal.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use aprsbot_link::{AprsCredentials, AprsIsLink, LinkConfig, PacketLink, RangeFilter};
//!
//! # async fn run() -> Result<(), aprsbot_link::LinkError> {
//! let credentials = AprsCredentials::new("W1AW", "12345")?;
//! let config = LinkConfig::new(credentials)
//!     .with_filter(RangeFilter::new(30.27, -97.74, 50.0)?);
//! let link = AprsIsLink::connect(&config).await?;
//!
//! while let Some(packet) = link.recv().await {
//!     println!("{} -> {:?}", packet.source, packet.payload);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod credentials;
pub mod error;
pub mod filter;
pub mod link;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod retry;

pub use client::{AprsIsLink, LinkConfig};
pub use credentials::AprsCredentials;
pub use error::LinkError;
pub use filter::RangeFilter;
pub use link::PacketLink;
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryLink;
pub use retry::{RetryPolicy, connect_with_retry};
