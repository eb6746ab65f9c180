//! Attachment extraction and binary/text classification.

use mail_parser::{Message, MessagePart, MimeHeaders};
use sha2::{Digest, Sha256};

use crate::model::attachment::Attachment;

/// Display name used when a part carries no usable filename.
pub const NO_FILENAME: &str = "no_filename";

/// How many leading bytes the binary heuristic inspects.
const SNIFF_LEN: usize = 8 * 1024;

/// Extract the attachments of a parsed message, in body-part order.
///
/// Only parts that carry both a content-type `name` and a disposition
/// `filename` count as attachments. Duplicate names are kept.
pub fn extract_attachments(msg: &Message<'_>) -> Vec<Attachment> {
    msg.parts.iter().filter_map(attachment_from_part).collect()
}

fn attachment_from_part(part: &MessagePart<'_>) -> Option<Attachment> {
    let type_name = non_empty(part.content_type().and_then(|ct| ct.attribute("name")))?;
    let disposition_name =
        non_empty(part.content_disposition().and_then(|d| d.attribute("filename")))?;

    let content = part.contents().to_vec();
    let content_type = part
        .content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Some(Attachment {
        filename: resolve_filename(Some(disposition_name), Some(type_name)),
        content_type: content_type.to_lowercase(),
        size: content.len() as u64,
        is_binary: is_binary_content(&content),
        sha256: format!("{:x}", Sha256::digest(&content)),
        content,
    })
}

/// Pick the display name: disposition filename, then content-type name,
/// then [`NO_FILENAME`].
pub fn resolve_filename(disposition: Option<&str>, content_type_name: Option<&str>) -> String {
    non_empty(disposition)
        .or_else(|| non_empty(content_type_name))
        .unwrap_or(NO_FILENAME)
        .to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Heuristic binary detection over the first [`SNIFF_LEN`] bytes.
///
/// A NUL byte, or more than 10% control bytes other than the usual text
/// whitespace (tab, LF, CR, form feed, ESC), marks the payload as binary.
pub fn is_binary_content(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(SNIFF_LEN)];
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }
    let control = sample
        .iter()
        .filter(|&&b| (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b)) || b == 0x7f)
        .count();
    control * 10 > sample.len()
}
