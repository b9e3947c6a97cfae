//! Integration tests for the session layer.
//!
//! - `harness.rs`     - mock transport, counting storage and wiring
//! - `refresh.rs`     - single-flight refresh, TTL, retry and backoff
//! - `interceptor.rs` - request pipeline: hydration, offline, 401 recovery, diagnostics
//! - `controller.rs`  - session state machine, snapshot handling, triggers
