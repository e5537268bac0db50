pub mod metrics;
pub mod requester;

pub use metrics::metrics_middleware;
pub use requester::RequesterContext;
