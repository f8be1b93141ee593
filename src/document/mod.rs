//! Document model: an immutable, page-addressable PDF
//!
//! A [`Document`] pairs the raw bytes of a merged score with its page count.
//! All operations are pure functions over those bytes: extraction and merging
//! parse on demand and never mutate the source, so a `Document` can be shared
//! freely across tasks.

mod pages;

use lopdf::Document as PdfDocument;
use uuid::Uuid;

use crate::error::{Error, Result};

use pages::assemble_pages;

/// An immutable, paginated source document (a merged PDF).
#[derive(Debug, Clone)]
pub struct Document {
    id: String,
    bytes: Vec<u8>,
    page_count: u32,
}

impl Document {
    /// Parse raw PDF bytes into a document with a freshly generated id.
    pub fn load(bytes: Vec<u8>) -> Result<Self> {
        Self::load_with_id(bytes, Uuid::new_v4().to_string())
    }

    /// Parse raw PDF bytes into a document with a caller-supplied id.
    ///
    /// Used when the bytes come from a stored arrangement whose id is already
    /// fixed; thumbnail cache keys are derived from this id.
    pub fn load_with_id(bytes: Vec<u8>, id: String) -> Result<Self> {
        let parsed = parse(&bytes)?;
        let page_count = parsed.get_pages().len() as u32;

        tracing::debug!(id = %id, page_count, "document loaded");

        Ok(Self {
            id,
            bytes,
            page_count,
        })
    }

    /// Concatenate the pages of each input document, in list order, into a
    /// single new document. Page order within each input is preserved.
    pub fn merge(inputs: &[Document]) -> Result<Self> {
        let mut sources = Vec::with_capacity(inputs.len());
        for input in inputs {
            let parsed = parse(&input.bytes)?;
            let pages = parsed.get_pages();
            let mut page_numbers: Vec<u32> = pages.keys().copied().collect();
            page_numbers.sort_unstable();
            let page_ids = page_numbers.iter().map(|n| pages[n]).collect::<Vec<_>>();
            sources.push((parsed, page_ids));
        }

        let total: usize = sources.iter().map(|(_, ids)| ids.len()).sum();
        tracing::debug!(inputs = inputs.len(), total_pages = total, "merging documents");

        let bytes = assemble_pages(&sources)?;
        Self::load(bytes)
    }

    /// Replace the document id, keeping bytes and page count.
    pub fn with_id(mut self, id: String) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Produce a standalone PDF containing exactly pages `start..=end`
    /// (1-based, inclusive), re-indexed from page 1 in the output.
    pub fn extract_range(&self, start: u32, end: u32) -> Result<Vec<u8>> {
        check_range(start, end, self.page_count)?;

        let parsed = parse(&self.bytes)?;
        let pages = parsed.get_pages();
        let mut page_ids = Vec::with_capacity((end - start + 1) as usize);
        for page_number in start..=end {
            let id = pages.get(&page_number).copied().ok_or_else(|| {
                Error::MalformedDocument(format!("page {} missing from page tree", page_number))
            })?;
            page_ids.push(id);
        }

        assemble_pages(&[(parsed, page_ids)])
    }

    /// Produce a standalone one-page PDF for the given page (1-based).
    pub fn extract_single_page(&self, page: u32) -> Result<Vec<u8>> {
        self.extract_range(page, page)
    }
}

/// Validate a 1-based inclusive page range against a document's page count.
pub fn check_range(start: u32, end: u32, page_count: u32) -> Result<()> {
    if start < 1 || end > page_count || start > end {
        return Err(Error::InvalidRange {
            start,
            end,
            page_count,
        });
    }
    Ok(())
}

fn parse(bytes: &[u8]) -> Result<PdfDocument> {
    PdfDocument::load_mem(bytes).map_err(|e| Error::MalformedDocument(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{page_width, sample_pdf};

    #[test]
    fn load_counts_pages() {
        let doc = Document::load(sample_pdf(4)).unwrap();
        assert_eq!(doc.page_count(), 4);
    }

    #[test]
    fn load_rejects_garbage() {
        let err = Document::load(b"not a pdf at all".to_vec()).unwrap_err();
        assert!(matches!(err, Error::MalformedDocument(_)));
    }

    #[test]
    fn extract_range_reindexes_from_one() {
        let doc = Document::load(sample_pdf(10)).unwrap();
        let bytes = doc.extract_range(3, 7).unwrap();
        let sub = Document::load(bytes).unwrap();
        assert_eq!(sub.page_count(), 5);
        // Page widths identify the source pages (100 + original index).
        assert_eq!(page_width(sub.bytes(), 1), 103);
        assert_eq!(page_width(sub.bytes(), 5), 107);
    }

    #[test]
    fn extract_single_page() {
        let doc = Document::load(sample_pdf(3)).unwrap();
        let bytes = doc.extract_single_page(2).unwrap();
        let sub = Document::load(bytes).unwrap();
        assert_eq!(sub.page_count(), 1);
        assert_eq!(page_width(sub.bytes(), 1), 102);
    }

    #[test]
    fn extract_rejects_invalid_ranges() {
        let doc = Document::load(sample_pdf(5)).unwrap();
        for (start, end) in [(0, 3), (1, 6), (4, 2)] {
            let err = doc.extract_range(start, end).unwrap_err();
            assert!(
                matches!(err, Error::InvalidRange { .. }),
                "{}..={} should be invalid",
                start,
                end
            );
        }
    }

    #[test]
    fn merge_preserves_order() {
        let a = Document::load(sample_pdf(3)).unwrap();
        // Offset widths so pages of B are distinguishable from pages of A.
        let b = Document::load(crate::test_support::sample_pdf_offset(2, 50)).unwrap();

        let merged = Document::merge(&[a.clone(), b]).unwrap();
        assert_eq!(merged.page_count(), 5);

        for i in 1..=3 {
            assert_eq!(page_width(merged.bytes(), i), 100 + i as i64);
        }
        for i in 4..=5 {
            assert_eq!(page_width(merged.bytes(), i), 150 + (i as i64 - 3));
        }
    }

    #[test]
    fn merge_of_single_document_is_identity_in_shape() {
        let a = Document::load(sample_pdf(2)).unwrap();
        let merged = Document::merge(std::slice::from_ref(&a)).unwrap();
        assert_eq!(merged.page_count(), 2);
        assert_ne!(merged.id(), a.id());
    }

    #[test]
    fn check_range_accepts_full_document() {
        assert!(check_range(1, 12, 12).is_ok());
        assert!(check_range(12, 12, 12).is_ok());
    }

    /// One page carrying a Link annotation whose /P points back at the page,
    /// as real viewers and editors write them.
    fn pdf_with_annotation_backref() -> Vec<u8> {
        use lopdf::{dictionary, Object, Stream};

        let mut doc = PdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        let annot_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => vec![0.into(), 0.into(), 100.into(), 20.into()],
            "P" => Object::Reference(page_id),
        });
        let content_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {},
            b"% annotated page".to_vec(),
        )));
        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![0.into(), 0.into(), 210.into(), 297.into()],
                "Contents" => Object::Reference(content_id),
                "Annots" => vec![Object::Reference(annot_id)],
            }),
        );
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("serialize test pdf");
        out
    }

    #[test]
    fn extract_terminates_on_annotation_backrefs() {
        use lopdf::Object;

        let doc = Document::load(pdf_with_annotation_backref()).unwrap();
        let bytes = doc.extract_single_page(1).unwrap();

        let sub = PdfDocument::load_mem(&bytes).unwrap();
        let pages = sub.get_pages();
        assert_eq!(pages.len(), 1);

        // The annotation survives and its /P resolves to the cloned page, not
        // to a second copy of it.
        let page_id = pages[&1];
        let page = sub.get_object(page_id).and_then(Object::as_dict).unwrap();
        let annots = page.get(b"Annots").and_then(Object::as_array).unwrap();
        let annot_id = annots[0].as_reference().unwrap();
        let annot = sub.get_object(annot_id).and_then(Object::as_dict).unwrap();
        assert_eq!(annot.get(b"P").unwrap().as_reference().unwrap(), page_id);
    }

    #[test]
    fn extract_clones_shared_resources_once() {
        use lopdf::{dictionary, Object, Stream};

        // Two pages sharing one content stream.
        let mut doc = PdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {},
            b"% shared".to_vec(),
        )));
        let mut kids: Vec<Object> = Vec::new();
        for _ in 0..2 {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![0.into(), 0.into(), 210.into(), 297.into()],
                "Contents" => Object::Reference(content_id),
            });
            kids.push(Object::Reference(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 2,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("serialize test pdf");

        let extracted = Document::load(bytes).unwrap().extract_range(1, 2).unwrap();
        let sub = PdfDocument::load_mem(&extracted).unwrap();
        assert_eq!(sub.get_pages().len(), 2);

        let streams = sub
            .objects
            .values()
            .filter(|object| matches!(object, Object::Stream(_)))
            .count();
        assert_eq!(streams, 1);

        // Both pages point at the same cloned stream.
        let pages = sub.get_pages();
        let contents: Vec<_> = (1..=2)
            .map(|n| {
                sub.get_object(pages[&n])
                    .and_then(Object::as_dict)
                    .unwrap()
                    .get(b"Contents")
                    .unwrap()
                    .as_reference()
                    .unwrap()
            })
            .collect();
        assert_eq!(contents[0], contents[1]);
    }
}
