//! Plain HTTP surface
//!
//! Requests that are not WebSocket upgrades land here: response builders,
//! the prefix router and its proxy and shell handlers.

pub mod proxy;
pub mod response;
pub mod router;
pub mod shell;

pub use proxy::{Proxy, Upstream};
pub use response::Response;
pub use router::{Outcome, Route, Router};
