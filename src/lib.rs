//! `mailproc`: batch processor for maildir-style email files.
//!
//! Discovers email files under domain/mailbox directories, claims them with
//! the read-only attribute, parses them in parallel partitions, and hands the
//! resulting documents (metadata, body text, attachments) to a sink.

pub mod config;
pub mod control;
pub mod discovery;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod scheduler;
pub mod sink;
