//! Logging conventions for quire.
//!
//! Events carry structured `tracing` fields (`subsystem`, `component`, `op`,
//! `note_id`, `user_id`) written as literals at the call site.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, unexpected state |
//! | INFO  | Lifecycle events, share mutations, deletions |
//! | DEBUG | Access decisions, denials, query shapes |
//! | TRACE | Per-row iteration |
