//! TwinFlow Inter-Cloud Bridge
//!
//! Cross-provider data continuity for mismatched pipeline edges. A bridge is
//! a pair of functions plus a bearer token: the target side exposes a public
//! HTTP-triggered ingress, the source side deploys a relay with the same
//! externally observable shape as the local counterpart it replaces, which
//! marshals each event into an authenticated HTTP POST. From a consumer's
//! perspective the edge behaves identically whether co-located or split.
//!
//! Tokens are minted once per connection and reused across deploys;
//! [`BridgeManager::recreate`] is the only rotation path (a silent new token
//! would strand already-configured consumers). Rotation policy beyond that
//! is an open hardening gap.

pub mod error;
pub mod manager;
pub mod relay;
pub mod token;

pub use error::{BridgeError, Result};
pub use manager::BridgeManager;
pub use relay::{RelayClient, RelayOutcome};
pub use token::mint_token;
