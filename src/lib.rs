//! Turnstile - Fixed-Window Admission Control
//!
//! This crate implements a process-local rate limiter for sensitive
//! endpoints. Each check is keyed by an action name and a client identifier
//! derived from forwarded-address headers, counted in fixed time windows,
//! and tracked in a bounded LRU registry. A small gRPC service exposes the
//! same gate to out-of-process callers.

pub mod config;
pub mod error;
pub mod grpc;
pub mod ratelimit;
