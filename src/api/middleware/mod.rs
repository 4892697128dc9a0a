//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Rate limiter: reject early
//! 2. Auth validator: bearer token → signed-in user
//! 3. Audit logger: logs after auth, has the user id

pub mod audit;
pub mod auth;
pub mod rate;
