//! # Serialization and File I/O Tests
//!
//! Round trips of preprocessed receipts through image files and the
//! run-length JSON format.

mod test_helpers;

#[cfg(test)]
mod tests {
    use super::test_helpers::{create_receipt_with_barcode, create_rotated_block};
    use image::DynamicImage;
    use receipt_reader::image_io::{load_image, save_image, ImageIoError};
    use receipt_reader::preprocessing::{preprocess, snap_to_binary};
    use receipt_reader::serialization::{
        compress_hex, decompress_hex, image_to_json, json_to_image, save_to_json, EncodedImage,
        SerializationError,
    };
    use tempfile::tempdir;

    fn processed_receipt() -> image::GrayImage {
        let page = DynamicImage::ImageLuma8(create_receipt_with_barcode(200));
        preprocess(&page).unwrap().to_luma8()
    }

    #[test]
    fn test_preprocessed_receipt_json_roundtrip() {
        let binary = processed_receipt();
        let json = image_to_json(&binary).unwrap();

        let document: EncodedImage = serde_json::from_str(&json).unwrap();
        assert_eq!(document.width, binary.width());
        assert_eq!(document.height, binary.height());
        assert!(document.image.starts_with('|'));

        assert_eq!(json_to_image(&json).unwrap(), binary);
    }

    /// Deskewed pages carry interpolated edges that must be snapped first
    #[test]
    fn test_rotated_receipt_serializes_after_snapping() {
        let page = DynamicImage::ImageLuma8(create_rotated_block(400, 200, 240.0, 80.0, 10.0));
        let rotated = preprocess(&page).unwrap().to_luma8();
        assert!(matches!(
            image_to_json(&rotated),
            Err(SerializationError::NonBinarySample(_))
        ));

        let snapped = snap_to_binary(&rotated);
        let dir = tempdir().unwrap();
        let base = dir.path().join("rotated");
        let path = save_to_json(base.to_str().unwrap(), &snapped).unwrap();

        let restored = json_to_image(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(restored, snapped);
        assert_eq!(restored.dimensions(), (400, 200));
    }

    #[test]
    fn test_run_counts_are_pixel_counts() {
        // Five black pixels are ten hex zeros, encoded as a run of 5
        let hex = "0000000000ffff";
        let encoded = compress_hex(hex);
        assert_eq!(encoded, "|50|2f");
        assert_eq!(decompress_hex(&encoded).unwrap(), vec![0, 0, 0, 0, 0, 255, 255]);
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("receipt");
        let binary = processed_receipt();

        let path = save_to_json(base.to_str().unwrap(), &binary).unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(json_to_image(&contents).unwrap(), binary);
    }

    #[test]
    fn test_png_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        let processed = DynamicImage::ImageLuma8(processed_receipt());

        save_image(&path, &processed).unwrap();
        assert_eq!(load_image(&path).unwrap(), processed);
    }

    #[test]
    fn test_load_errors_are_distinguished() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_image(dir.path().join("missing.png")),
            Err(ImageIoError::NotFound(_))
        ));

        let tiff = dir.path().join("scan.tiff");
        std::fs::write(&tiff, b"II*\0").unwrap();
        assert!(matches!(load_image(&tiff), Err(ImageIoError::UnsupportedFormat(_))));
    }
}
