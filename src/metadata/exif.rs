use std::io::Cursor;

use exif::{Exif, In, Tag, Value};

use crate::CaptureMetadata;

pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Never fails: an unreadable or missing container is reported as `found == false`.
    pub fn extract(bytes: &[u8]) -> CaptureMetadata {
        let mut reader = Cursor::new(bytes);

        match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif_data) => Self::parse_exif(&exif_data),
            Err(e) => {
                log::debug!("no capture metadata container: {}", e);
                CaptureMetadata::absent()
            }
        }
    }

    fn parse_exif(exif: &Exif) -> CaptureMetadata {
        let make = Self::ascii_field(exif, Tag::Make);
        let model = Self::ascii_field(exif, Tag::Model);
        let software = Self::ascii_field(exif, Tag::Software);
        let captured_at = Self::ascii_field(exif, Tag::DateTimeOriginal);

        let found = make.is_some() || model.is_some() || software.is_some() || captured_at.is_some();

        if found {
            log::debug!(
                "capture metadata: make={:?} model={:?} software={:?}",
                make, model, software
            );
        }

        CaptureMetadata {
            found,
            make,
            model,
            software,
            captured_at,
        }
    }

    fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
        let field = exif.get_field(tag, In::PRIMARY)?;

        let text = match field.value {
            Value::Ascii(ref values) => values
                .iter()
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .collect::<Vec<_>>()
                .join(" "),
            _ => field.display_value().to_string(),
        };

        let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());

        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}
