//! Local proxy daemon for a DynamoDB-compatible HTTP API.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod translate;

pub use config::schema::ProxyConfig;
pub use http::ProxyServer;
pub use lifecycle::{AcceptGate, Outcome, Shutdown};
pub use translate::{HttpTranslator, Translator};
