//! Raster-only PDF documents built with `lopdf`.
//!
//! Both the chunk artifacts and the final output are [`RasterDocument`]s:
//! a flat page tree where every page is one full-bleed image XObject.
//! Image samples are stored as 8-bit DeviceRGB behind `FlateDecode`, so the
//! encoding is lossless and a page can be decoded back to the exact raster
//! that was appended.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use image::RgbImage;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Name under which each page's raster is registered in its resources.
const IMAGE_NAME: &str = "Im0";

/// A PDF under construction whose pages are appended in order.
pub struct RasterDocument {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl Default for RasterDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append one page showing `raster` stretched over a `width` × `height`
    /// point media box.
    pub fn append_page(
        &mut self,
        raster: &RgbImage,
        width: f32,
        height: f32,
    ) -> Result<(), lopdf::Error> {
        let image_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => raster.width() as i64,
            "Height" => raster.height() as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        };
        let mut image = Stream::new(image_dict, raster.as_raw().clone());
        image.compress()?;
        let image_id = self.doc.add_object(image);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width.into(),
                        0.into(),
                        0.into(),
                        height.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    IMAGE_NAME => image_id,
                },
            },
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    /// Move every page of `other` to the end of this document, keeping their
    /// order. Returns the number of pages appended.
    pub fn append_document(&mut self, mut other: Document) -> Result<usize, lopdf::Error> {
        other.renumber_objects_with(self.doc.max_id + 1);
        self.doc.max_id = self.doc.max_id.max(other.max_id);

        // get_pages walks the page tree, so this is document order.
        let page_ids: Vec<ObjectId> = other.get_pages().into_values().collect();

        for (id, object) in other.objects {
            let skip = matches!(
                object.type_name(),
                Ok(b"Catalog") | Ok(b"Pages") | Ok(b"Outlines") | Ok(b"Outline")
            );
            if !skip {
                self.doc.objects.insert(id, object);
            }
        }

        for &page_id in &page_ids {
            let page = self.doc.get_object_mut(page_id)?.as_dict_mut()?;
            page.set("Parent", self.pages_id);
            self.kids.push(page_id.into());
        }

        Ok(page_ids.len())
    }

    /// Finish the page tree and catalog, optionally compact, and write the
    /// document to `out`.
    pub fn write_to<W: Write>(mut self, out: &mut W, compact: bool) -> Result<(), String> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        if compact {
            let pruned = self.doc.prune_objects();
            let empty = self.doc.delete_zero_length_streams();
            self.doc.renumber_objects();
            self.doc.compress();
            debug!(
                pruned = pruned.len(),
                empty_streams = empty.len(),
                "Compacted document"
            );
        }

        self.doc.save_to(out).map_err(|e| e.to_string())
    }

    /// Write the document to a new file at `path`.
    pub fn save(self, path: &Path, compact: bool) -> Result<(), String> {
        let file = std::fs::File::create(path).map_err(|e| e.to_string())?;
        let mut writer = std::io::BufWriter::new(file);
        self.write_to(&mut writer, compact)?;
        writer.flush().map_err(|e| e.to_string())
    }
}

/// Read a page's raster and media size back out of a [`RasterDocument`] file.
///
/// Only understands documents written by this module: one DeviceRGB image
/// per page registered as `/Im0`.
pub fn read_raster_page(doc: &Document, page_id: ObjectId) -> Result<(RgbImage, f32, f32), String> {
    let err = |e: lopdf::Error| e.to_string();
    let page = doc.get_dictionary(page_id).map_err(err)?;

    let media_box = page.get(b"MediaBox").and_then(Object::as_array).map_err(err)?;
    let [_, _, width, height] = media_box.as_slice() else {
        return Err(format!("malformed MediaBox on {page_id:?}"));
    };
    let width = width.as_float().map_err(err)?;
    let height = height.as_float().map_err(err)?;

    let resources = resolve_dict(doc, page.get(b"Resources").map_err(err)?)?;
    let xobjects = resolve_dict(doc, resources.get(b"XObject").map_err(err)?)?;
    let image_id = xobjects
        .get(IMAGE_NAME.as_bytes())
        .and_then(Object::as_reference)
        .map_err(err)?;
    let stream = doc.get_object(image_id).and_then(Object::as_stream).map_err(err)?;

    let w = stream.dict.get(b"Width").and_then(Object::as_i64).map_err(err)? as u32;
    let h = stream.dict.get(b"Height").and_then(Object::as_i64).map_err(err)? as u32;
    let samples = if stream.dict.has(b"Filter") {
        stream.decompressed_content().map_err(err)?
    } else {
        stream.content.clone()
    };

    let image = RgbImage::from_raw(w, h, samples)
        .ok_or_else(|| format!("image on {page_id:?} is not {w}x{h} RGB"))?;
    Ok((image, width, height))
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Result<&'a lopdf::Dictionary, String> {
    match object {
        Object::Reference(id) => doc.get_dictionary(*id).map_err(|e| e.to_string()),
        other => other.as_dict().map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, v: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([v, 255 - v, v / 2]))
    }

    fn pages_of(bytes: &[u8]) -> (Document, Vec<ObjectId>) {
        let doc = Document::load_mem(bytes).unwrap();
        let ids = doc.get_pages().into_values().collect();
        (doc, ids)
    }

    #[test]
    fn appended_pages_round_trip() {
        let mut rd = RasterDocument::new();
        rd.append_page(&solid(8, 4, 10), 612.0, 792.0).unwrap();
        rd.append_page(&solid(4, 8, 20), 300.0, 400.0).unwrap();
        assert_eq!(rd.page_count(), 2);

        let mut buf = Vec::new();
        rd.write_to(&mut buf, true).unwrap();

        let (doc, ids) = pages_of(&buf);
        assert_eq!(ids.len(), 2);
        let (img, w, h) = read_raster_page(&doc, ids[1]).unwrap();
        assert_eq!(img, solid(4, 8, 20));
        assert_eq!((w, h), (300.0, 400.0));
    }

    #[test]
    fn append_document_keeps_page_order() {
        let mut first = RasterDocument::new();
        first.append_page(&solid(2, 2, 1), 100.0, 100.0).unwrap();
        first.append_page(&solid(2, 2, 2), 100.0, 100.0).unwrap();
        let mut first_bytes = Vec::new();
        first.write_to(&mut first_bytes, false).unwrap();

        let mut second = RasterDocument::new();
        second.append_page(&solid(2, 2, 3), 200.0, 100.0).unwrap();
        let mut second_bytes = Vec::new();
        second.write_to(&mut second_bytes, false).unwrap();

        let mut merged = RasterDocument::new();
        assert_eq!(merged.append_document(Document::load_mem(&first_bytes).unwrap()).unwrap(), 2);
        assert_eq!(merged.append_document(Document::load_mem(&second_bytes).unwrap()).unwrap(), 1);
        let mut out = Vec::new();
        merged.write_to(&mut out, true).unwrap();

        let (doc, ids) = pages_of(&out);
        let values: Vec<u8> = ids
            .iter()
            .map(|&id| read_raster_page(&doc, id).unwrap().0.get_pixel(0, 0)[0])
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(read_raster_page(&doc, ids[2]).unwrap().1, 200.0);
    }

    #[test]
    fn empty_document_still_serialises() {
        let mut buf = Vec::new();
        RasterDocument::new().write_to(&mut buf, true).unwrap();
        let (_, ids) = pages_of(&buf);
        assert!(ids.is_empty());
    }
}
