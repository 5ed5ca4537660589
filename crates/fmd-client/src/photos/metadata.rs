use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};
use std::io::Cursor;

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Capture time from EXIF: DateTimeOriginal, then DateTimeDigitized, then DateTime.
///
/// EXIF timestamps carry no zone; the value is the camera's local time.
pub fn capture_time(image: &[u8]) -> Option<NaiveDateTime> {
    let exif = Reader::new()
        .read_from_container(&mut Cursor::new(image))
        .ok()?;

    [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime]
        .into_iter()
        .filter_map(|tag| exif.get_field(tag, In::PRIMARY))
        .find_map(|field| match &field.value {
            Value::Ascii(parts) => parts.first().and_then(|raw| parse_exif_datetime(raw)),
            _ => None,
        })
}

fn parse_exif_datetime(raw: &[u8]) -> Option<NaiveDateTime> {
    let text = std::str::from_utf8(raw).ok()?;
    NaiveDateTime::parse_from_str(text.trim_end_matches('\0').trim(), EXIF_DATETIME_FORMAT).ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use exif::experimental::Writer;
    use exif::Field;

    /// Minimal JPEG carrying the given EXIF ASCII fields.
    pub(crate) fn jpeg_with_exif(fields: &[(Tag, &str)]) -> Vec<u8> {
        let fields: Vec<Field> = fields
            .iter()
            .map(|(tag, value)| Field {
                tag: *tag,
                ifd_num: In::PRIMARY,
                value: Value::Ascii(vec![value.as_bytes().to_vec()]),
            })
            .collect();
        let mut writer = Writer::new();
        for field in &fields {
            writer.push_field(field);
        }
        let mut tiff = Cursor::new(Vec::new());
        writer.write(&mut tiff, false).unwrap();
        let tiff = tiff.into_inner();

        let segment_len = (2 + 6 + tiff.len()) as u16;
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
        jpeg.extend_from_slice(&segment_len.to_be_bytes());
        jpeg.extend_from_slice(b"Exif\0\0");
        jpeg.extend_from_slice(&tiff);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn test_prefers_original_timestamp() {
        let jpeg = jpeg_with_exif(&[
            (Tag::DateTime, "2024:01:01 00:00:00"),
            (Tag::DateTimeOriginal, "2023:07:14 18:30:05"),
        ]);
        let ts = capture_time(&jpeg).unwrap();
        assert_eq!(ts.to_string(), "2023-07-14 18:30:05");
    }

    #[test]
    fn test_falls_back_to_datetime() {
        let jpeg = jpeg_with_exif(&[(Tag::DateTime, "2022:02:03 04:05:06")]);
        assert_eq!(capture_time(&jpeg).unwrap().to_string(), "2022-02-03 04:05:06");
    }

    #[test]
    fn test_unparseable_or_missing_exif() {
        let jpeg = jpeg_with_exif(&[(Tag::DateTimeOriginal, "not a date")]);
        assert_eq!(capture_time(&jpeg), None);
        assert_eq!(capture_time(&[0xFF, 0xD8, 0xFF, 0xD9]), None);
        assert_eq!(capture_time(b"plain text"), None);
    }
}
