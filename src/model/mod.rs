//! Core data model types: candidate files, parsed documents, addresses, and attachments.

pub mod address;
pub mod attachment;
pub mod candidate;
pub mod document;
