use serde::Serialize;

use crate::storage::models::RecordKey;

/// Whether a file can be handed to the document renderer.
///
/// Wider than a plain `ends_with(".pdf")`: the extension matches in any ASCII
/// case (`SONG.PDF`), and a bare `.pdf` with nothing before it is rejected.
pub fn is_previewable(name: &str) -> bool {
    name.len() > 4
        && name
            .get(name.len() - 4..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(".pdf"))
}

/// The record currently being previewed. The page count stays empty until
/// the renderer reports it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub key: RecordKey,
    pub url: String,
    pub page_count: Option<u32>,
}

/// Holds at most one preview.
#[derive(Debug, Clone, Default)]
pub struct PreviewSlot(Option<Preview>);

impl PreviewSlot {
    pub fn select(&mut self, key: RecordKey, url: String) {
        self.0 = Some(Preview {
            key,
            url,
            page_count: None,
        });
    }

    /// Record the decoded page count. Ignored when nothing is previewed or the
    /// report is for a URL that has since been replaced.
    pub fn record_page_count(&mut self, url: &str, pages: u32) -> bool {
        match self.0 {
            Some(ref mut preview) if preview.url == url => {
                preview.page_count = Some(pages);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    pub fn is_showing(&self, key: &RecordKey) -> bool {
        self.0.as_ref().is_some_and(|p| &p.key == key)
    }

    pub fn current(&self) -> Option<&Preview> {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_previewable() {
        assert!(is_previewable("song.pdf"));
        assert!(is_previewable("SONG.PDF"));
        assert!(!is_previewable("song.pdf.zip"));
        assert!(!is_previewable("song.png"));
        assert!(!is_previewable(".pdf"));
        assert!(!is_previewable("악보"));
    }

    #[test]
    fn test_select_replaces_and_resets_page_count() {
        let mut slot = PreviewSlot::default();
        slot.select(RecordKey::new("u1", "a.pdf"), "http://x/a.pdf".to_string());
        assert!(slot.record_page_count("http://x/a.pdf", 3));

        slot.select(RecordKey::new("u1", "b.pdf"), "http://x/b.pdf".to_string());
        let current = slot.current().unwrap();
        assert_eq!(current.key.name, "b.pdf");
        assert_eq!(current.page_count, None);
    }

    #[test]
    fn test_late_page_count_for_replaced_preview_is_ignored() {
        let mut slot = PreviewSlot::default();
        slot.select(RecordKey::new("u1", "a.pdf"), "http://x/a.pdf".to_string());
        slot.select(RecordKey::new("u1", "b.pdf"), "http://x/b.pdf".to_string());

        assert!(!slot.record_page_count("http://x/a.pdf", 7));
        assert_eq!(slot.current().unwrap().page_count, None);
    }

    #[test]
    fn test_clear() {
        let mut slot = PreviewSlot::default();
        slot.select(RecordKey::new("u1", "a.pdf"), "http://x/a.pdf".to_string());
        slot.clear();
        assert!(slot.current().is_none());
        assert!(!slot.record_page_count("http://x/a.pdf", 1));
    }
}
