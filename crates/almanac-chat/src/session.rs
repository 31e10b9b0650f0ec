//! Per-session state: the append-only transcript and the attachment holder.

use almanac_ai::{Role, Turn, Usage};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::io;
use std::path::Path;

/// A single decoded calendar image associated with the session.
///
/// Holds the transmittable (base64) form; rendering the image is someone
/// else's job. Replaced wholesale on each new upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    data: String,
    mime_type: String,
    label: String,
}

impl Attachment {
    /// Build an attachment from raw image bytes, sniffing the format.
    /// Only JPEG and PNG are accepted.
    pub fn from_bytes(bytes: &[u8], label: impl Into<String>) -> io::Result<Self> {
        let mime_type = sniff_mime_type(bytes).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                "unsupported image format (expected JPEG or PNG)",
            )
        })?;

        Ok(Self {
            data: STANDARD.encode(bytes),
            mime_type: mime_type.to_string(),
            label: label.into(),
        })
    }

    /// Load an attachment from a file on disk
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_bytes(&bytes, label)
    }

    /// The detected mime type ("image/jpeg" or "image/png")
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Display label (usually the file name)
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Convert to a content block for the request payload
    pub fn to_content(&self) -> almanac_ai::Content {
        almanac_ai::Content::image(self.data.clone(), self.mime_type.clone())
    }
}

fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else {
        None
    }
}

/// One interactive session: an append-only transcript plus at most one
/// attachment. Created at session start, dropped at session end; nothing
/// persists across runs.
#[derive(Debug, Default)]
pub struct Session {
    turns: Vec<Turn>,
    attachment: Option<Attachment>,
    total_usage: Usage,
}

impl Session {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn to the end of the transcript.
    /// Past turns are never reordered or mutated.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// All turns in insertion order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recently appended user turn
    pub fn latest_user_turn(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == Role::User)
    }

    /// Whether the transcript is empty
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Install an attachment, replacing any existing one
    pub fn set_attachment(&mut self, attachment: Attachment) {
        self.attachment = Some(attachment);
    }

    /// The current attachment, if any
    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// Remove the current attachment. Returns whether one was present.
    pub fn clear_attachment(&mut self) -> bool {
        self.attachment.take().is_some()
    }

    /// Accumulated token usage for the session
    pub fn total_usage(&self) -> &Usage {
        &self.total_usage
    }

    /// Add one turn's usage to the session total
    pub fn record_usage(&mut self, usage: &Usage) {
        self.total_usage.add(usage);
    }

    /// Reset the session: transcript, attachment, and usage
    pub fn clear(&mut self) {
        self.turns.clear();
        self.attachment = None;
        self.total_usage = Usage::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
    const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00];

    #[test]
    fn test_turns_keep_insertion_order() {
        let mut session = Session::new();
        session.push(Turn::user("A"));
        session.push(Turn::assistant("B"));
        session.push(Turn::user("C"));

        let texts: Vec<String> = session.turns().iter().map(|t| t.text()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_latest_user_turn() {
        let mut session = Session::new();
        assert!(session.latest_user_turn().is_none());

        session.push(Turn::user("first"));
        session.push(Turn::assistant("reply"));
        session.push(Turn::user("second"));
        session.push(Turn::assistant("reply 2"));

        assert_eq!(session.latest_user_turn().unwrap().text(), "second");
    }

    #[test]
    fn test_attachment_replaced_not_accumulated() {
        let mut session = Session::new();
        session.set_attachment(Attachment::from_bytes(PNG_BYTES, "first.png").unwrap());
        session.set_attachment(Attachment::from_bytes(JPEG_BYTES, "second.jpg").unwrap());

        let att = session.attachment().unwrap();
        assert_eq!(att.label(), "second.jpg");
        assert_eq!(att.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_clear_attachment() {
        let mut session = Session::new();
        assert!(!session.clear_attachment());

        session.set_attachment(Attachment::from_bytes(PNG_BYTES, "cal.png").unwrap());
        assert!(session.clear_attachment());
        assert!(session.attachment().is_none());
    }

    #[test]
    fn test_sniff_rejects_unknown_format() {
        let err = Attachment::from_bytes(b"GIF89a....", "cal.gif").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_usage_accumulates() {
        let mut session = Session::new();
        session.record_usage(&Usage { input: 10, output: 4 });
        session.record_usage(&Usage { input: 5, output: 1 });
        assert_eq!(session.total_usage(), &Usage { input: 15, output: 5 });
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut session = Session::new();
        session.push(Turn::user("hello"));
        session.set_attachment(Attachment::from_bytes(PNG_BYTES, "cal.png").unwrap());
        session.record_usage(&Usage { input: 1, output: 1 });

        session.clear();
        assert!(session.is_empty());
        assert!(session.attachment().is_none());
        assert_eq!(session.total_usage(), &Usage::default());
    }
}
