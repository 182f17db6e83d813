//! # Barcode Decoder
//!
//! Turns a grayscale [`Frame`] into barcode text. The real implementation is
//! backed by `rxing`; tests substitute their own [`BarcodeDecoder`].

use std::collections::HashMap;

use rxing::helpers::detect_in_luma_with_hints;

use crate::backend::Frame;

/// One decoded symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    /// Symbology name, e.g. "EAN_13".
    pub format: Option<String>,
}

/// Finds a barcode in a frame.
///
/// Implementations are stateless; `None` means nothing readable was found.
pub trait BarcodeDecoder: Send + Sync {
    fn decode(&self, frame: &Frame) -> Option<Decoded>;
}

/// Multi-format decoder (EAN, UPC, Code 128, QR, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct RxingDecoder;

impl BarcodeDecoder for RxingDecoder {
    fn decode(&self, frame: &Frame) -> Option<Decoded> {
        if frame.width == 0 || frame.height == 0 || frame.is_truncated() {
            return None;
        }

        // `detect_in_luma` swaps width and height; the hinted variant does not
        let result = detect_in_luma_with_hints(
            frame.luma.clone(),
            frame.width,
            frame.height,
            None,
            &mut HashMap::new(),
        )
        .ok()?;
        let text = result.getText().to_string();
        if text.is_empty() {
            return None;
        }

        Some(Decoded {
            text,
            format: Some(format!("{:?}", result.getBarcodeFormat())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxing::{BarcodeFormat, MultiFormatWriter, Writer};

    /// Renders `contents` as black bars on white, `width` x `height`.
    fn render(contents: &str, format: BarcodeFormat, width: u32, height: u32) -> Frame {
        let matrix = MultiFormatWriter
            .encode(contents, &format, width as i32, height as i32)
            .unwrap();
        let (w, h) = (matrix.width(), matrix.height());

        let mut luma = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                luma.push(if matrix.get(x, y) { 0 } else { 255 });
            }
        }
        Frame::new(w, h, luma)
    }

    #[test]
    fn test_reads_ean13_in_wide_frame() {
        let frame = render("3017620425035", BarcodeFormat::EAN_13, 340, 160);
        assert_ne!(frame.width, frame.height);

        let decoded = RxingDecoder.decode(&frame).unwrap();
        assert_eq!(decoded.text, "3017620425035");
        assert_eq!(decoded.format.as_deref(), Some("EAN_13"));
    }

    #[test]
    fn test_reads_upca_in_wide_frame() {
        let frame = render("012000171901", BarcodeFormat::UPC_A, 340, 160);

        let decoded = RxingDecoder.decode(&frame).unwrap();
        assert_eq!(decoded.text, "012000171901");
    }

    #[test]
    fn test_blank_frame_has_no_barcode() {
        let frame = Frame::new(64, 64, vec![255; 64 * 64]);
        assert!(RxingDecoder.decode(&frame).is_none());
    }

    #[test]
    fn test_degenerate_frames_rejected() {
        assert!(RxingDecoder.decode(&Frame::new(0, 0, vec![])).is_none());
        assert!(RxingDecoder.decode(&Frame::new(10, 10, vec![0; 5])).is_none());
    }
}
