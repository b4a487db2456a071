pub mod headers;
pub mod middleware;
pub mod transport;

pub use transport::{ProxyScheme, ProxySpec, Route, Transport};
