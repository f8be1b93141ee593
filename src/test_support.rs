//! Shared helpers for unit tests: in-memory PDF fabrication and inspection.

use lopdf::{dictionary, Document as PdfDocument, Object, Stream};

/// Build an `n`-page PDF where page `i` (1-based) has a MediaBox width of
/// `100 + i`, so extracted and merged pages can be traced back to their source.
pub(crate) fn sample_pdf(n: usize) -> Vec<u8> {
    sample_pdf_offset(n, 0)
}

/// Like [`sample_pdf`] but widths start at `100 + offset + 1`.
pub(crate) fn sample_pdf_offset(n: usize, offset: i64) -> Vec<u8> {
    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::with_capacity(n);
    for i in 1..=n {
        let content_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {},
            format!("% page {}", i).into_bytes(),
        )));
        let width = 100 + offset + i as i64;
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), width.into(), 297.into()],
            "Contents" => Object::Reference(content_id),
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
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

/// Read the MediaBox width of a page (1-based) from serialized PDF bytes.
pub(crate) fn page_width(bytes: &[u8], page: u32) -> i64 {
    let doc = PdfDocument::load_mem(bytes).expect("parse test pdf");
    let pages = doc.get_pages();
    let page_id = pages[&page];
    let page_dict = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .expect("page dictionary");
    let media_box = page_dict
        .get(b"MediaBox")
        .expect("MediaBox present")
        .as_array()
        .expect("MediaBox array");
    media_box[2].as_i64().expect("integer width")
}
