//! Request interception
//!
//! The [`Router`] decides whether a request is handled and with which
//! [`Strategy`]; the [`StrategySet`] serves it from the runtime cache and the
//! [`Upstream`], admitting responses through the validator.

pub mod router;
pub mod strategy;
pub mod traits;
pub mod upstream;
pub mod validator;

pub use router::{Decision, Route, Router};
pub use strategy::{Strategy, StrategySet};
pub use traits::{FetchError, FetchOptions, Upstream};
pub use upstream::HttpUpstream;
pub use validator::is_admissible;
