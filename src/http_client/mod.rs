pub mod circuit_breaker;
pub mod host_limiter;
pub mod resilient_client;
pub mod retry_policy;
pub mod transport;

pub use circuit_breaker::CircuitBreaker;
pub use host_limiter::{HostLimiter, HostLimiterRegistry};
pub use resilient_client::{FetchOutcome, ResilientClient};
pub use retry_policy::RetryPolicy;
pub use transport::{HttpTransport, ReqwestTransport, TransportRequest, TransportResponse};
