//! Turning raw message bytes into a [`ParsedEmailDocument`].

use chrono::{DateTime, Utc};
use mail_parser::{HeaderValue, Message, MessageParser, PartType};
use sha2::{Digest, Sha256};

use crate::config::ParserConfig;
use crate::error::{ProcessorError, Result};
use crate::model::address::EmailAddress;
use crate::model::candidate::CandidateFile;
use crate::model::document::ParsedEmailDocument;

use super::attachments::extract_attachments;

/// Parse raw file bytes into a document for `file`.
pub fn parse_document(
    raw: &[u8],
    file: &CandidateFile,
    options: &ParserConfig,
) -> Result<ParsedEmailDocument> {
    let message_bytes = if options.strip_mbox_separator {
        skip_from_line(raw)
    } else {
        raw
    };

    let msg = MessageParser::default()
        .parse(message_bytes)
        .ok_or_else(|| ProcessorError::Parse {
            path: file.path.clone(),
            reason: "not a MIME message".into(),
        })?;

    if options.require_headers && !has_standard_headers(&msg) {
        return Err(ProcessorError::Parse {
            path: file.path.clone(),
            reason: "no RFC 5322 headers found".into(),
        });
    }

    let body_text =
        plain_text_body(&msg).or_else(|| msg.body_html(0).map(|html| html_to_text(&html)));

    Ok(ParsedEmailDocument {
        id: format!("{:x}", Sha256::digest(raw)),
        source_path: file.path.clone(),
        domain: file.domain.clone(),
        mailbox: file.mailbox.clone(),
        size: raw.len() as u64,
        message_id: msg.message_id().map(String::from),
        subject: msg.subject().unwrap_or_default().to_string(),
        from: EmailAddress::list_from(msg.from()),
        to: EmailAddress::list_from(msg.to()),
        cc: EmailAddress::list_from(msg.cc()),
        bcc: EmailAddress::list_from(msg.bcc()),
        reply_to: EmailAddress::list_from(msg.reply_to()),
        date: msg
            .date()
            .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0)),
        in_reply_to: header_ids(msg.in_reply_to()).into_iter().next(),
        references: header_ids(msg.references()),
        raw_headers: extract_raw_headers(message_bytes),
        body_text,
        attachments: extract_attachments(&msg),
        processed_at: Utc::now(),
    })
}

/// `true` if the message has at least one of the headers every real mail carries.
fn has_standard_headers(msg: &Message<'_>) -> bool {
    msg.from().is_some()
        || msg.to().is_some()
        || msg.subject().is_some()
        || msg.date().is_some()
        || msg.message_id().is_some()
}

/// First genuine `text/plain` body part, if any.
fn plain_text_body(msg: &Message<'_>) -> Option<String> {
    msg.text_body
        .iter()
        .find_map(|&id| match msg.parts.get(id as usize).map(|part| &part.body) {
            Some(PartType::Text(text)) => Some(text.to_string()),
            _ => None,
        })
}

/// Message ids from an id-list header (`In-Reply-To`, `References`).
fn header_ids(value: &HeaderValue<'_>) -> Vec<String> {
    match value {
        HeaderValue::Text(id) => vec![id.to_string()],
        HeaderValue::TextList(ids) => ids.iter().map(|id| id.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Skip a BOM and the `From ` separator line of mbox-exported files.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Extract the raw headers as a string (everything before the first blank line).
fn extract_raw_headers(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    let end = match (text.find("\r\n\r\n"), text.find("\n\n")) {
        (Some(crlf), Some(lf)) => crlf.min(lf),
        (Some(crlf), None) => crlf,
        (None, Some(lf)) => lf,
        (None, None) => text.len(),
    };
    text[..end].to_string()
}

/// Convert an HTML body to plain text for indexing.
///
/// Block elements become line breaks, scripts and styles are dropped, tags
/// are stripped and the common entities decoded.
pub fn html_to_text(html: &str) -> String {
    let mut text = remove_tag_block(html, "script");
    text = remove_tag_block(&text, "style");

    let mut result = String::with_capacity(text.len());
    let mut tag = String::new();
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let name = tag
                    .trim_start_matches('/')
                    .split(|c: char| c.is_whitespace() || c == '/')
                    .next()
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if matches!(
                    name.as_str(),
                    "br" | "p" | "div" | "tr" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
                ) {
                    result.push('\n');
                }
            }
            _ if in_tag => tag.push(ch),
            _ => result.push(ch),
        }
    }

    for (entity, replacement) in [
        ("&nbsp;", " "),
        ("&#160;", " "),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&apos;", "'"),
        ("&amp;", "&"),
    ] {
        result = result.replace(entity, replacement);
    }

    // Collapse runs of blank lines
    let mut cleaned = String::with_capacity(result.len());
    let mut prev_was_blank = false;
    for line in result.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank {
                cleaned.push('\n');
                prev_was_blank = true;
            }
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }
    cleaned.trim().to_string()
}

/// Remove an entire tag block (e.g. `<script>…</script>`), case-insensitively.
fn remove_tag_block(html: &str, tag: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut result = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = lower[pos..].find(&open).map(|i| pos + i) {
        result.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => return result,
        }
    }
    result.push_str(&html[pos..]);
    result
}
