//! Thin document/page layer over `lopdf`.
//!
//! Page coordinates exposed here use a top-left origin, with y growing
//! downwards, measured from the page's media box.

use crate::models::Rect;
use crate::processing::text_layer::{TextInterpreter, TextLayer};
use crate::utils::CardError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;

/// An opened PDF. Dropping it releases the parsed document.
pub struct PdfDocument {
    inner: Document,
    page_ids: Vec<ObjectId>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_ids.len())
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CardError> {
        let path = path.as_ref();
        let inner = Document::load(path).map_err(|e| {
            CardError::DocumentOpenError(format!("Failed to open {:?}: {}", path, e))
        })?;
        Ok(Self::from_document(inner))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CardError> {
        let inner = Document::load_mem(bytes)
            .map_err(|e| CardError::DocumentOpenError(format!("Failed to parse PDF: {}", e)))?;
        Ok(Self::from_document(inner))
    }

    fn from_document(inner: Document) -> Self {
        // get_pages is keyed by 1-based page number
        let page_ids = inner.get_pages().values().copied().collect();
        PdfDocument { inner, page_ids }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn page(&self, index: usize) -> Result<PdfPage<'_>, CardError> {
        let id = *self.page_ids.get(index).ok_or_else(|| {
            CardError::DocumentOpenError(format!(
                "Page index {} out of range (document has {} pages)",
                index,
                self.page_ids.len()
            ))
        })?;
        let media_box = inherited(&self.inner, id, b"MediaBox")
            .and_then(|obj| resolve(&self.inner, obj).as_array().ok())
            .and_then(|arr| rect_from_array(arr))
            // US Letter, the PDF default
            .unwrap_or(Rect::new(0.0, 0.0, 612.0, 792.0));
        Ok(PdfPage {
            doc: self,
            id,
            index,
            media_box,
        })
    }

    pub fn pages(&self) -> impl Iterator<Item = PdfPage<'_>> {
        (0..self.page_ids.len()).filter_map(move |i| self.page(i).ok())
    }

    pub(crate) fn inner(&self) -> &Document {
        &self.inner
    }
}

/// Read-only view of one page.
#[derive(Clone, Copy)]
pub struct PdfPage<'a> {
    doc: &'a PdfDocument,
    id: ObjectId,
    index: usize,
    /// Media box in native PDF space (bottom-left origin).
    media_box: Rect,
}

impl<'a> PdfPage<'a> {
    /// 0-based page index.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn resources(&self) -> Option<&'a Dictionary> {
        let doc = &self.doc.inner;
        inherited(doc, self.id, b"Resources").and_then(|obj| resolve(doc, obj).as_dict().ok())
    }

    /// Interpret the page's content streams into positioned glyphs.
    pub fn text_layer(&self) -> Result<TextLayer, CardError> {
        let doc = &self.doc.inner;
        let content = doc.get_page_content(self.id).map_err(|e| {
            CardError::DocumentOpenError(format!(
                "Failed to read content of page {}: {}",
                self.index + 1,
                e
            ))
        })?;
        let mut interpreter = TextInterpreter::new(doc, self.media_box);
        interpreter.run(&content, self.resources())?;
        Ok(interpreter.finish())
    }

    /// Plain text of the whole page, one line per text baseline.
    pub fn text(&self) -> Result<String, CardError> {
        Ok(self.text_layer()?.plain_text())
    }

    /// Text of the glyphs whose centre lies inside `rect` (top-left origin).
    pub fn text_in_rect(&self, rect: Rect) -> Result<String, CardError> {
        Ok(self.text_layer()?.text_in_rect(rect))
    }
}

/// Follow an indirect reference; anything else is returned as is.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

pub(crate) fn dict_get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|obj| resolve(doc, obj))
}

pub(crate) fn dict_get_dict<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    match dict_get(doc, dict, key)? {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

pub(crate) fn dict_get_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    dict_get(doc, dict, key).and_then(as_number)
}

pub(crate) fn dict_get_name<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    dict_get(doc, dict, key).and_then(|obj| obj.as_name().ok())
}

pub(crate) fn as_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

/// Look up a page attribute, walking up the page tree through `/Parent`.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = page_id;
    // Bounded walk so a cyclic /Parent chain cannot hang us
    for _ in 0..32 {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

fn rect_from_array(arr: &[Object]) -> Option<Rect> {
    if arr.len() != 4 {
        return None;
    }
    let n: Vec<f64> = arr.iter().filter_map(as_number).collect();
    if n.len() != 4 {
        return None;
    }
    Some(Rect::new(
        n[0].min(n[2]),
        n[1].min(n[3]),
        n[0].max(n[2]),
        n[1].max(n[3]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_pdf::{TestPdf, TextRun};

    #[test]
    fn test_open_garbage_fails() {
        match PdfDocument::from_bytes(b"definitely not a pdf") {
            Err(CardError::DocumentOpenError(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_fails() {
        assert!(matches!(
            PdfDocument::open("/nonexistent/file.pdf"),
            Err(CardError::DocumentOpenError(_))
        ));
    }

    #[test]
    fn test_page_geometry() {
        let bytes = TestPdf::new().page(vec![]).page(vec![]).build();
        let doc = PdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(doc.page_count(), 2);
        let page = doc.page(1).unwrap();
        assert_eq!(page.index(), 1);
        assert_eq!(page.media_box, Rect::new(0.0, 0.0, 595.0, 842.0));
        assert!(doc.page(2).is_err());
    }

    #[test]
    fn test_plain_text_lines() {
        let bytes = TestPdf::new()
            .page(vec![
                TextRun::at(60.0, 100.0, "FIN 1234 5678 9012"),
                TextRun::at(60.0, 130.0, "Second line"),
            ])
            .build();
        let doc = PdfDocument::from_bytes(&bytes).unwrap();
        let text = doc.page(0).unwrap().text().unwrap();
        assert_eq!(text, "FIN 1234 5678 9012\nSecond line");
    }

    #[test]
    fn test_text_in_rect_uses_top_left_origin() {
        let bytes = TestPdf::new()
            .page(vec![
                TextRun::in_rect(Rect::new(50.0, 430.0, 300.0, 435.0), "01/02/1990"),
                TextRun::in_rect(Rect::new(50.0, 500.0, 300.0, 510.0), "Male"),
            ])
            .build();
        let doc = PdfDocument::from_bytes(&bytes).unwrap();
        let page = doc.page(0).unwrap();
        assert_eq!(
            page.text_in_rect(Rect::new(50.0, 430.0, 300.0, 435.0)).unwrap(),
            "01/02/1990"
        );
        assert_eq!(
            page.text_in_rect(Rect::new(50.0, 500.0, 300.0, 510.0)).unwrap(),
            "Male"
        );
        assert_eq!(page.text_in_rect(Rect::new(50.0, 0.0, 300.0, 50.0)).unwrap(), "");
    }
}
