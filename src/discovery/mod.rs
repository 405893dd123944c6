//! Branch, tag and pull request discovery.
//!
//! Traits are folded into a [`DiscoveryContext`], which is captured by a
//! [`DiscoveryRequest`]; [`scan::run`] then walks the request's listings
//! through prefilters, filters and authorities and hands accepted heads to a
//! [`HeadObserver`].

pub mod checkout;
pub mod context;
pub mod filter;
pub mod head;
pub mod observer;
pub mod request;
pub mod scan;
pub mod traits;

pub use checkout::{CheckoutSpec, MergeWith};
pub use context::DiscoveryContext;
pub use filter::{Authority, ForkTrust, HeadFilter, HeadRegex, Prefilter};
pub use head::{CheckoutStrategy, Head, HeadKind, MergeHash, PullRequestOrigin, Revision};
pub use observer::{CollectingObserver, HeadObserver, HeadSelector, Observation};
pub use request::DiscoveryRequest;
pub use scan::{run, ScanSummary};
pub use traits::{default_traits, BranchDiscoveryStrategy, SourceTrait};
