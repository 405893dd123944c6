//! Dependency injection infrastructure for ghscout
//!
//! Discovery, probing and notifications talk to GitHub through the traits in
//! [`traits`], so tests can run them against the in-memory doubles in
//! [`mocks`].
//!
//! # Example (Production)
//! ```no_run
//! use ghscout::di::ServiceContainer;
//!
//! # fn example() -> ghscout::core::ScoutResult<()> {
//! let container = ServiceContainer::new(None)?;
//! let request = container.discovery_request(None)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example (Testing)
//! ```
//! use ghscout::auth::StaticToken;
//! use ghscout::di::{ServiceContainer, mocks::*};
//! use std::sync::Arc;
//!
//! let container = ServiceContainer::with_providers(
//!     Arc::new(MockConfigProvider::default()),
//!     Arc::new(StaticToken::new("token")),
//!     Arc::new(MockRemoteClient::new().with_branch("master", "abc")),
//! );
//! ```

pub mod container;
pub mod mocks;
pub mod traits;

// Re-export key types
pub use container::{AppTokens, ServiceContainer};
pub use traits::{ConfigProvider, RemoteClient, TokenIssuer, TokenSource};
