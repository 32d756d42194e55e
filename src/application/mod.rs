//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Rate limiter (per-client sliding windows behind a circuit breaker)
//! - License validator (store lookup plus the decision function)
//! - Response formatter (verdicts to wire bodies)
//! - Update service (release metadata for deployed plugins)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod circuit_breaker;
pub mod formatter;
pub mod limiter;
pub mod metrics;
pub mod ports;
pub mod updates;
pub mod validator;
