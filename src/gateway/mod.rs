//! Gateway server implementation

pub mod handler;
pub mod proxy;
mod router;
pub mod routing;
mod server;

pub use handler::{RequestError, RequestHandler};
pub use proxy::{Forwarder, HttpProxy, ProxyRequest, ProxyResponse};
pub use router::{AppState, create_router};
pub use routing::{BackendTarget, OriginRef, OriginSource, ProcessEnv, Route, RouteError, RouteTable, ServiceRouter};
pub use server::Gateway;
