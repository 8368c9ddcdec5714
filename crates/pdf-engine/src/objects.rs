//! Lenient accessors over the lopdf object graph.
//!
//! Extraction must never fail because a page is oddly shaped; these helpers
//! return `None` for anything missing or malformed.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

const MAX_REFERENCE_HOPS: usize = 16;
const MAX_TREE_DEPTH: usize = 64;

/// Follow indirect references until a direct object is reached.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    let mut current = object;
    for _ in 0..MAX_REFERENCE_HOPS {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

pub(crate) fn get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    resolve(doc, dict.get(key).ok()?)
}

pub(crate) fn get_dict<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    match get(doc, dict, key)? {
        Object::Dictionary(inner) => Some(inner),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

pub(crate) fn get_array<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Vec<Object>> {
    match get(doc, dict, key)? {
        Object::Array(items) => Some(items),
        _ => None,
    }
}

pub(crate) fn get_name<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    name(get(doc, dict, key)?)
}

pub(crate) fn get_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f32> {
    number(get(doc, dict, key)?)
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

pub(crate) fn name(object: &Object) -> Option<&[u8]> {
    match object {
        Object::Name(value) => Some(value.as_slice()),
        _ => None,
    }
}

/// Six-element numeric array such as `/Matrix` or `/FontMatrix`.
pub(crate) fn matrix_values(doc: &Document, items: &[Object]) -> Option<[f32; 6]> {
    if items.len() != 6 {
        return None;
    }

    let mut values = [0.0; 6];
    for (slot, item) in values.iter_mut().zip(items) {
        *slot = number(resolve(doc, item)?)?;
    }
    Some(values)
}

/// Stream payload with filters applied when present.
pub(crate) fn stream_content(stream: &Stream) -> Option<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content().ok()
    } else {
        Some(stream.content.clone())
    }
}

/// Look up a page attribute, walking `/Parent` links for inheritable keys.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Some(value) = get(doc, node, key) {
            return Some(value);
        }
        node = get_dict(doc, node, b"Parent")?;
    }
    None
}

/// Concatenated, decoded content streams of a page.
pub(crate) fn page_content(doc: &Document, page_id: ObjectId) -> Option<Vec<u8>> {
    let page = doc.get_dictionary(page_id).ok()?;
    let contents = get(doc, page, b"Contents")?;

    let mut buffer = Vec::new();
    match contents {
        Object::Stream(stream) => buffer.extend(stream_content(stream)?),
        Object::Array(parts) => {
            for part in parts {
                if let Some(Object::Stream(stream)) = resolve(doc, part) {
                    match stream_content(stream) {
                        Some(bytes) => {
                            buffer.extend(bytes);
                            buffer.push(b'\n');
                        }
                        None => tracing::warn!(?page_id, "skipping undecodable content stream"),
                    }
                }
            }
        }
        _ => return None,
    }

    Some(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn resolve_follows_reference_chain() {
        let mut doc = Document::with_version("1.5");
        let target = doc.add_object(Object::Integer(42));
        let hop = doc.add_object(Object::Reference(target));

        let reference = Object::Reference(hop);
        let resolved = resolve(&doc, &reference).expect("should resolve");
        assert_eq!(number(resolved), Some(42.0));
    }

    #[test]
    fn resolve_gives_up_on_cycles() {
        let mut doc = Document::with_version("1.5");
        let id = doc.new_object_id();
        doc.objects.insert(id, Object::Reference(id));

        assert!(resolve(&doc, &Object::Reference(id)).is_none());
    }

    #[test]
    fn inherited_walks_parent_chain() {
        let mut doc = Document::with_version("1.5");
        let parent = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Rotate" => 90,
        });
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => parent,
        });

        let rotate = inherited(&doc, page, b"Rotate").and_then(number);
        assert_eq!(rotate, Some(90.0));
        assert!(inherited(&doc, page, b"MediaBox").is_none());
    }

    #[test]
    fn matrix_values_requires_six_numbers() {
        let doc = Document::with_version("1.5");
        let items: Vec<Object> = vec![1.into(), 0.into(), 0.into(), 1.into(), 5.into(), 6.into()];

        assert_eq!(matrix_values(&doc, &items), Some([1.0, 0.0, 0.0, 1.0, 5.0, 6.0]));
        assert_eq!(matrix_values(&doc, &items[..4]), None);
    }
}
