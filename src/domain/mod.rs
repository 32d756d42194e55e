//! Domain layer - pure business logic with no I/O.
//!
//! This layer contains the core concepts and invariants of license validation:
//! - License records and their typed fields
//! - Validation requests and verdicts
//! - The ordered decision function
//! - Sliding request windows for rate limiting
//! - Plugin release versions
//!
//! All types in this layer are pure and easily testable.

pub mod license;
pub mod request;
pub mod validation;
pub mod verdict;
pub mod version;
pub mod window;
