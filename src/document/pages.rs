//! Low-level page assembly on top of lopdf
//!
//! Builds a fresh PDF from pages picked out of one or more parsed source
//! documents. Each selected page is deep-cloned together with the resources it
//! references, then hung off a new page tree so the output stands alone.

use std::collections::HashMap;

use lopdf::{dictionary, Document as PdfDocument, Object, ObjectId};

use crate::error::{Error, Result};

/// Assemble a new PDF from `(source, page object ids)` pairs, in order.
///
/// Page ids must belong to their paired source document. The output re-indexes
/// pages starting at 1.
pub(super) fn assemble_pages(sources: &[(PdfDocument, Vec<ObjectId>)]) -> Result<Vec<u8>> {
    let mut target = PdfDocument::with_version("1.5");
    let pages_id = target.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    for (source, page_ids) in sources {
        // Source-to-target id map shared across the pages of one source, so
        // resources referenced from several pages (fonts, XObjects) are
        // cloned once and back-references terminate instead of recursing.
        let mut cloned_ids: HashMap<ObjectId, ObjectId> = HashMap::new();
        for page_id in page_ids {
            let cloned_id = clone_page(source, &mut target, *page_id, &mut cloned_ids)?;
            // The cloned page joins the new tree; its old /Parent was skipped
            // during cloning.
            if let Ok(Object::Dictionary(page_dict)) = target.get_object_mut(cloned_id) {
                page_dict.set("Parent", Object::Reference(pages_id));
            }
            kids.push(Object::Reference(cloned_id));
        }
    }

    let count = kids.len() as i64;
    target.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = target.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    target.trailer.set("Root", Object::Reference(catalog_id));

    target.renumber_objects();
    target.compress();

    let mut output = Vec::new();
    target
        .save_to(&mut output)
        .map_err(|e| Error::MalformedDocument(format!("failed to serialize document: {}", e)))?;
    Ok(output)
}

/// Deep-clone a single page object into `target`, returning its new id.
fn clone_page(
    source: &PdfDocument,
    target: &mut PdfDocument,
    page_id: ObjectId,
    cloned_ids: &mut HashMap<ObjectId, ObjectId>,
) -> Result<ObjectId> {
    if let Some(existing) = cloned_ids.get(&page_id) {
        return Ok(*existing);
    }

    let page_object = source
        .get_object(page_id)
        .map_err(|e| Error::MalformedDocument(format!("cannot read page object: {}", e)))?;

    // Reserve the target id before descending so back-references to this page
    // (annotation /P entries) resolve to it instead of recursing.
    let new_id = target.new_object_id();
    cloned_ids.insert(page_id, new_id);

    let cloned = deep_clone_object(source, target, page_object, cloned_ids)?;
    target.objects.insert(new_id, cloned);
    Ok(new_id)
}

/// Recursively clone an object graph from `source` into `target`.
///
/// Each source reference is cloned at most once; revisits resolve through
/// `cloned_ids`, which both deduplicates shared resources and terminates
/// reference cycles. /Parent is skipped to detach pages from the source page
/// tree; the caller re-parents cloned pages.
fn deep_clone_object(
    source: &PdfDocument,
    target: &mut PdfDocument,
    object: &Object,
    cloned_ids: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Object> {
    match object {
        Object::Dictionary(dict) => {
            let mut new_dict = lopdf::Dictionary::new();
            for (key, value) in dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                let cloned_value = deep_clone_object(source, target, value, cloned_ids)?;
                new_dict.set(key.clone(), cloned_value);
            }
            Ok(Object::Dictionary(new_dict))
        }
        Object::Array(array) => {
            let mut new_array = Vec::with_capacity(array.len());
            for item in array {
                new_array.push(deep_clone_object(source, target, item, cloned_ids)?);
            }
            Ok(Object::Array(new_array))
        }
        Object::Reference(ref_id) => {
            if let Some(mapped) = cloned_ids.get(ref_id) {
                return Ok(Object::Reference(*mapped));
            }
            match source.get_object(*ref_id) {
                Ok(referenced) => {
                    let new_id = target.new_object_id();
                    cloned_ids.insert(*ref_id, new_id);
                    let cloned = deep_clone_object(source, target, referenced, cloned_ids)?;
                    target.objects.insert(new_id, cloned);
                    Ok(Object::Reference(new_id))
                }
                Err(err) => {
                    tracing::warn!(?ref_id, %err, "unresolvable reference replaced with null");
                    Ok(Object::Null)
                }
            }
        }
        Object::Stream(stream) => {
            let mut new_dict = lopdf::Dictionary::new();
            for (key, value) in stream.dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                let cloned_value = deep_clone_object(source, target, value, cloned_ids)?;
                new_dict.set(key.clone(), cloned_value);
            }
            Ok(Object::Stream(lopdf::Stream::new(
                new_dict,
                stream.content.clone(),
            )))
        }
        other => Ok(other.clone()),
    }
}
