//! PDF assembly: ordered page images → one output file.
//!
//! Each captured page becomes one PDF page whose media box equals the
//! image's pixel dimensions, so the PDF reproduces exactly what was
//! captured with no scaling or letterboxing. Page bitmaps are embedded as
//! baseline JPEG streams (`DCTDecode`) — screen captures of book pages
//! compress an order of magnitude better as JPEG than as PNG, and the
//! quality tier picks the trade-off.
//!
//! ## Why spawn_blocking?
//!
//! Decoding a thousand PNGs and re-encoding them as JPEG is CPU-bound by a
//! wide margin. `tokio::task::spawn_blocking` moves the work onto the
//! blocking thread pool so the async runtime (still servicing the
//! cancellation listener) never stalls.

use crate::config::PdfQuality;
use crate::error::SessionError;
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Assemble `pages` (in order) into a PDF at `output`.
///
/// Returns the output file size in bytes.
pub(crate) async fn assemble_pdf(
    pages: Vec<PathBuf>,
    output: PathBuf,
    quality: PdfQuality,
) -> Result<u64, SessionError> {
    tokio::task::spawn_blocking(move || assemble_blocking(&pages, &output, quality))
        .await
        .map_err(|e| SessionError::Internal(format!("Assembly task panicked: {e}")))?
}

fn assemble_blocking(
    pages: &[PathBuf],
    output: &Path,
    quality: PdfQuality,
) -> Result<u64, SessionError> {
    if pages.is_empty() {
        return Err(SessionError::AssemblyFailed {
            path: output.to_path_buf(),
            detail: "no pages to assemble".to_string(),
        });
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for (i, page_path) in pages.iter().enumerate() {
        let img = image::open(page_path).map_err(|e| SessionError::PageUnreadable {
            path: page_path.clone(),
            detail: e.to_string(),
        })?;
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, quality.jpeg_quality())
            .encode_image(&rgb)
            .map_err(|e| SessionError::AssemblyFailed {
                path: output.to_path_buf(),
                detail: format!("JPEG encoding failed for page {}: {e}", i + 1),
            })?;
        debug!(page = i + 1, width, height, bytes = jpeg.len(), "page encoded");

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        (width as i64).into(),
                        0.into(),
                        0.into(),
                        (height as i64).into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content.encode().map_err(|e| SessionError::AssemblyFailed {
            path: output.to_path_buf(),
            detail: format!("content stream encoding failed: {e}"),
        })?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (width as i64).into(), (height as i64).into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(page_id.into());
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
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    // The image streams carry their own DCTDecode filter and are skipped;
    // this only flate-compresses the small content streams.
    if quality.compress_streams() {
        doc.compress();
    }

    doc.save(output).map_err(|e| SessionError::AssemblyFailed {
        path: output.to_path_buf(),
        detail: e.to_string(),
    })?;

    let bytes = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    info!(pages = pages.len(), bytes, path = %output.display(), "PDF assembled");
    Ok(bytes)
}
