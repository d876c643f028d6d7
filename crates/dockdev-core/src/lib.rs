//! Core engine for dockdev: per-domain development environment provisioning.
//!
//! The CLI crate drives external services (container runtime, reverse proxy,
//! database, trust store); everything with a durable-file invariant lives
//! here so it can be tested without any of those services present.

/// Certificate authority management (root CA + per-domain leaf certs).
pub mod cert;
/// Configuration assembled once at startup from `.env` + process env.
pub mod config;
/// The failure taxonomy shared by the create and delete workflows.
pub mod error;
/// Small filesystem helpers.
pub mod fsutil;
/// Hosts-file read-modify-write with exact-token matching.
pub mod hosts;
/// Persistent IP allocator over the flat `.ipmap.env` file.
pub mod ipmap;
/// Exclusive workflow lock guarding shared-file mutations.
pub mod lock;
/// Placeholder template rendering for project artifacts.
pub mod template;
