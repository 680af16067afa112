//! Line framing for the streamed console protocol.
//!
//! The backend writes newline-delimited UTF-8. Two line prefixes are reserved:
//! `__META__=` carries a JSON object describing the finished run and
//! `__END__=` closes the stream with an `ok:<bool> rc:<int>` tail. Every other
//! line is console output and is rendered verbatim.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

pub const META_PREFIX: &str = "__META__=";
pub const END_PREFIX: &str = "__END__=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Content(String),
    /// Raw JSON payload after the meta prefix, not yet parsed.
    Meta(String),
    /// Raw tail after the end prefix.
    End(String),
}

pub fn classify_frame(line: &str) -> StreamFrame {
    if let Some(payload) = line.strip_prefix(META_PREFIX) {
        return StreamFrame::Meta(payload.to_string());
    }
    if let Some(tail) = line.strip_prefix(END_PREFIX) {
        return StreamFrame::End(tail.to_string());
    }
    StreamFrame::Content(line.to_string())
}

/// Result record the backend emits on the meta line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamMeta {
    pub run_id: Option<String>,
    pub returncode: Option<i64>,
    pub log_url: Option<String>,
    pub report_url: Option<String>,
    pub output_xml_url: Option<String>,
}

impl StreamMeta {
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Non-empty log locator, if the run produced one.
    pub fn locator(&self) -> Option<&str> {
        self.log_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndMarker {
    pub ok: Option<bool>,
    pub rc: Option<i32>,
    pub raw: String,
}

fn ok_pattern() -> &'static Regex {
    static OK: OnceLock<Regex> = OnceLock::new();
    OK.get_or_init(|| Regex::new(r"\bok:(true|false)\b").expect("static regex"))
}

fn rc_pattern() -> &'static Regex {
    static RC: OnceLock<Regex> = OnceLock::new();
    RC.get_or_init(|| Regex::new(r"\brc:(-?\d+)\b").expect("static regex"))
}

impl EndMarker {
    pub fn parse(tail: &str) -> Self {
        let ok = ok_pattern()
            .captures(tail)
            .map(|caps| &caps[1] == "true");
        let rc = rc_pattern()
            .captures(tail)
            .and_then(|caps| caps[1].parse().ok());
        Self {
            ok,
            rc,
            raw: tail.to_string(),
        }
    }
}

/// Reassembles lines from arbitrarily sized byte chunks.
///
/// Bytes are held until a `\n` arrives, so neither a line nor a multi-byte
/// character split across chunks is ever emitted in pieces.
#[derive(Debug, Clone, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            lines.push(String::from_utf8_lossy(&self.pending[start..end]).into_owned());
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Unterminated remainder left when the stream ends.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(rest)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn classify_frame_recognizes_reserved_prefixes_only_at_line_start() {
        assert_eq!(
            classify_frame("__META__={\"log_url\":\"/x\"}"),
            StreamFrame::Meta("{\"log_url\":\"/x\"}".to_string())
        );
        assert_eq!(classify_frame("__END__=rc:0"), StreamFrame::End("rc:0".to_string()));
        assert_eq!(
            classify_frame("  __META__={}"),
            StreamFrame::Content("  __META__={}".to_string())
        );
        assert_eq!(classify_frame(""), StreamFrame::Content(String::new()));
    }

    #[test]
    fn stream_meta_ignores_unknown_fields_and_blank_locators() {
        let meta = StreamMeta::parse(r#"{"log_url":"/static/runs/a/log.html","cmd":["robot"],"returncode":1}"#)
            .expect("meta");
        assert_eq!(meta.locator(), Some("/static/runs/a/log.html"));
        assert_eq!(meta.returncode, Some(1));

        let blank = StreamMeta::parse(r#"{"log_url":"  ","run_id":"r1"}"#).expect("meta");
        assert_eq!(blank.locator(), None);

        let null = StreamMeta::parse(r#"{"log_url":null}"#).expect("meta");
        assert_eq!(null.locator(), None);

        assert!(StreamMeta::parse("{not json").is_err());
    }

    #[test]
    fn end_marker_extracts_ok_and_return_code() {
        let marker = EndMarker::parse("ok:false rc:3");
        assert_eq!(marker.ok, Some(false));
        assert_eq!(marker.rc, Some(3));

        let bare = EndMarker::parse("rc:0");
        assert_eq!(bare.ok, None);
        assert_eq!(bare.rc, Some(0));

        let junk = EndMarker::parse("whatever");
        assert_eq!(junk, EndMarker { ok: None, rc: None, raw: "whatever".to_string() });
    }

    #[test]
    fn assembler_holds_partial_lines_between_chunks() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push(b"lin").is_empty());
        assert_eq!(assembler.push(b"e1\nli"), vec!["line1".to_string()]);
        assert_eq!(assembler.pending_len(), 2);
        assert_eq!(assembler.push(b"ne2\n\n"), vec!["line2".to_string(), String::new()]);
        assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn assembler_reassembles_split_multibyte_characters() {
        let text = "Execução ✅\n".as_bytes();
        let mut assembler = LineAssembler::new();
        let mut lines = Vec::new();
        for byte in text {
            lines.extend(assembler.push(std::slice::from_ref(byte)));
        }
        assert_eq!(lines, vec!["Execução ✅".to_string()]);
    }

    #[test]
    fn assembler_finish_returns_unterminated_tail() {
        let mut assembler = LineAssembler::new();
        assert_eq!(assembler.push(b"a\ntail"), vec!["a".to_string()]);
        assert_eq!(assembler.finish(), Some("tail".to_string()));
        assert_eq!(assembler.finish(), None);
    }
}
