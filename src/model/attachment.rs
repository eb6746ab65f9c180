//! Attachments extracted from a parsed message.

/// One attachment, with its decoded payload held in memory.
///
/// The payload is kept only for the lifetime of the document it belongs to;
/// sinks serialize the metadata and the digest, never the bytes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Attachment {
    /// Disposition filename, else content-type name, else `no_filename`.
    pub filename: String,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Decoded payload size in bytes.
    pub size: u64,

    /// Result of the byte-content heuristic; metadata only.
    pub is_binary: bool,

    /// Hex SHA-256 of the decoded payload.
    pub sha256: String,

    /// Decoded payload.
    #[serde(skip)]
    pub content: Vec<u8>,
}
