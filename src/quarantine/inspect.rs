//! Upload content validation.
//!
//! Checks run in order: size, declared type allow-list, executable
//! signatures, then magic bytes against the declared type.

use std::collections::HashSet;

use crate::config::QuarantineConfig;
use crate::quarantine::types::ReasonCode;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const ELF_MAGIC: &[u8] = b"\x7fELF";

/// Why an upload failed inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub code: ReasonCode,
    pub reason: String,
}

impl Finding {
    fn new(code: ReasonCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContentInspector {
    max_bytes: usize,
    allowed: HashSet<String>,
}

/// `type/subtype` without parameters, lowercased.
pub fn essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

impl ContentInspector {
    pub fn new(max_bytes: usize, allowed: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            max_bytes,
            allowed: allowed.into_iter().map(|m| essence(m.as_ref())).collect(),
        }
    }

    pub fn from_config(config: &QuarantineConfig) -> Self {
        Self::new(config.max_upload_bytes, &config.allowed_mime_types)
    }

    pub fn inspect(&self, bytes: &[u8], declared_mime: &str) -> Result<(), Finding> {
        if bytes.len() > self.max_bytes {
            return Err(Finding::new(
                ReasonCode::FileTooLarge,
                format!("{} bytes exceeds limit of {}", bytes.len(), self.max_bytes),
            ));
        }

        let mime = essence(declared_mime);
        if !self.allowed.contains(&mime) {
            return Err(Finding::new(
                ReasonCode::DisallowedType,
                format!("type {mime:?} is not allowed"),
            ));
        }

        if let Some(kind) = executable_signature(bytes, &mime) {
            return Err(Finding::new(
                ReasonCode::ExecutableContent,
                format!("{kind} signature in upload declared as {mime}"),
            ));
        }

        if !matches_declared(bytes, &mime) {
            return Err(Finding::new(
                ReasonCode::MimeMismatch,
                format!("content does not match declared type {mime}"),
            ));
        }

        Ok(())
    }
}

fn is_text(mime: &str) -> bool {
    matches!(mime, "text/plain" | "text/csv")
}

/// `MZ` is only two printable bytes, so text uploads skip it. A real PE image
/// still fails the text check below on its NUL padding.
fn executable_signature(bytes: &[u8], mime: &str) -> Option<&'static str> {
    if bytes.starts_with(ELF_MAGIC) {
        Some("ELF")
    } else if bytes.starts_with(b"MZ") && !is_text(mime) {
        Some("PE")
    } else if bytes.starts_with(b"#!") {
        Some("shebang")
    } else {
        None
    }
}

fn matches_declared(bytes: &[u8], mime: &str) -> bool {
    match mime {
        "application/pdf" => bytes.starts_with(b"%PDF-"),
        "image/png" => bytes.starts_with(PNG_MAGIC),
        "image/jpeg" => bytes.starts_with(JPEG_MAGIC),
        "image/gif" => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
        m if is_text(m) => !bytes.contains(&0) && std::str::from_utf8(bytes).is_ok(),
        // No signature known; the allow-list already admitted it.
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inspector() -> ContentInspector {
        ContentInspector::from_config(&QuarantineConfig::default())
    }

    #[test]
    fn test_clean_files_pass() {
        let i = inspector();
        assert_eq!(i.inspect(b"%PDF-1.7\n...", "application/pdf"), Ok(()));
        assert_eq!(i.inspect(b"\x89PNG\r\n\x1a\n....", "image/png"), Ok(()));
        assert_eq!(i.inspect(&[0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg"), Ok(()));
        assert_eq!(i.inspect(b"GIF89a..", "image/gif"), Ok(()));
        assert_eq!(i.inspect("שם,סכום\nא,1\n".as_bytes(), "text/csv; charset=utf-8"), Ok(()));
    }

    #[test]
    fn test_too_large() {
        let i = ContentInspector::new(4, ["text/plain"]);
        assert_eq!(i.inspect(b"hello", "text/plain").unwrap_err().code, ReasonCode::FileTooLarge);
    }

    #[test]
    fn test_disallowed_type() {
        let err = inspector().inspect(b"<html>", "text/html").unwrap_err();
        assert_eq!(err.code, ReasonCode::DisallowedType);
    }

    #[test]
    fn test_mime_mismatch() {
        let err = inspector().inspect(b"GIF89a..", "application/pdf").unwrap_err();
        assert_eq!(err.code, ReasonCode::MimeMismatch);

        let err = inspector().inspect(&[0x00, 0x01, 0x02], "text/plain").unwrap_err();
        assert_eq!(err.code, ReasonCode::MimeMismatch);
    }

    #[test]
    fn test_executables() {
        for payload in [&b"\x7fELF\x02\x01"[..], b"MZ\x90\x00", b"#!/bin/sh\nrm -rf /"] {
            let err = inspector().inspect(payload, "application/pdf").unwrap_err();
            assert_eq!(err.code, ReasonCode::ExecutableContent);
        }
        let err = inspector().inspect(b"#!/bin/sh\n", "text/plain").unwrap_err();
        assert_eq!(err.code, ReasonCode::ExecutableContent);
    }

    #[test]
    fn test_text_starting_with_mz() {
        let i = inspector();
        assert_eq!(i.inspect(b"MZ_code,amount\nA1,120\n", "text/csv"), Ok(()));
        assert_eq!(i.inspect(b"MZ region notes", "text/plain"), Ok(()));

        // A PE binary declared as text is still quarantined.
        let err = i.inspect(b"MZ\x90\x00\x03\x00", "text/plain").unwrap_err();
        assert_eq!(err.code, ReasonCode::MimeMismatch);
    }
}
