//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding over text
//! keys:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 seconds)
//! - Absent optional fields are omitted, never encoded as null
//!
//! The canonical encoding is critical: it ensures that the same record
//! produces identical bytes (and thus identical ids) on every peer.

use crate::error::CoreError;
use crate::record::{Captcha, Record};

/// Domain separation prefix for record signatures.
pub const SIGN_DOMAIN: &[u8] = b"tessera/record-sig/v1";

/// Field keys. Must match the serde names on [`Record`].
mod keys {
    pub const KIND: &str = "kind";
    pub const TIMESTAMP: &str = "timestamp";
    pub const TITLE: &str = "title";
    pub const TEXT: &str = "text";
    pub const PREV: &str = "prev";
    pub const PARENT: &str = "parent";
    pub const CAPTCHA: &str = "captcha";
    pub const CONTENT: &str = "content";
    pub const RECIPIENT: &str = "recipient";
    pub const NONCE: &str = "nonce";
    pub const PUB_KEY: &str = "pubKey";
    pub const SIG: &str = "sig";
    pub const ANSWER: &str = "answer";
    pub const IMAGE: &str = "image";
}

/// The subset of CBOR the canonical form uses.
enum Node {
    Int(i64),
    Uint(u64),
    Text(String),
    Map(Vec<(&'static str, Node)>),
}

/// Encode a record to canonical bytes.
pub fn canonical_bytes(record: &Record) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128 + record.text.len());
    encode_node(&mut buf, &record_to_node(record));
    buf
}

/// Construct the signed message: domain prefix plus the canonical bytes of
/// the record with its signature cleared.
pub fn signed_message(record: &Record) -> Vec<u8> {
    let unsigned = canonical_bytes(&record.unsigned());
    let mut buf = Vec::with_capacity(SIGN_DOMAIN.len() + unsigned.len());
    buf.extend_from_slice(SIGN_DOMAIN);
    buf.extend_from_slice(&unsigned);
    buf
}

/// Decode a record from CBOR bytes.
///
/// Missing optional fields take their defaults here, at the boundary. The
/// caller recomputes the id from the decoded record; bytes that carry extra
/// or non-canonical data therefore never hash to the key they claim.
pub fn decode_record(bytes: &[u8]) -> Result<Record, CoreError> {
    if bytes.is_empty() {
        return Err(CoreError::MalformedRecord("empty".into()));
    }
    ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
}

fn record_to_node(record: &Record) -> Node {
    let mut entries = Vec::with_capacity(12);

    entries.push((keys::KIND, Node::Text(record.kind.as_str().into())));
    entries.push((keys::TIMESTAMP, Node::Int(record.timestamp)));
    if let Some(title) = &record.title {
        entries.push((keys::TITLE, Node::Text(title.clone())));
    }
    entries.push((keys::TEXT, Node::Text(record.text.clone())));
    if let Some(prev) = &record.prev {
        entries.push((keys::PREV, Node::Text(prev.to_hex())));
    }
    if let Some(parent) = &record.parent {
        entries.push((keys::PARENT, Node::Text(parent.to_hex())));
    }
    if let Some(captcha) = &record.captcha {
        entries.push((keys::CAPTCHA, captcha_to_node(captcha)));
    }
    if let Some(content) = &record.content {
        entries.push((keys::CONTENT, Node::Text(content.clone())));
    }
    if let Some(recipient) = &record.recipient {
        entries.push((keys::RECIPIENT, Node::Text(recipient.to_hex())));
    }
    entries.push((keys::NONCE, Node::Uint(record.nonce)));
    if let Some(pk) = &record.pub_key {
        entries.push((keys::PUB_KEY, Node::Text(pk.to_hex())));
    }
    if let Some(sig) = &record.sig {
        entries.push((keys::SIG, Node::Text(sig.to_hex())));
    }

    Node::Map(entries)
}

fn captcha_to_node(captcha: &Captcha) -> Node {
    Node::Map(vec![
        (keys::ANSWER, Node::Text(captcha.answer.clone())),
        (keys::IMAGE, Node::Text(captcha.image.clone())),
    ])
}

fn encode_node(buf: &mut Vec<u8>, node: &Node) {
    match node {
        Node::Uint(n) => encode_uint(buf, 0, *n),
        Node::Int(i) => encode_int(buf, *i),
        Node::Text(s) => encode_text(buf, s),
        Node::Map(entries) => encode_map_canonical(buf, entries),
    }
}

/// Encode a signed integer (major types 0 and 1).
fn encode_int(buf: &mut Vec<u8>, i: i64) {
    if i >= 0 {
        encode_uint(buf, 0, i as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - i) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(&'static str, Node)]) {
    let mut pairs: Vec<(Vec<u8>, &Node)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::with_capacity(k.len() + 1);
            encode_text(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_node(buf, value);
    }
}
