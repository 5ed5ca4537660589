//! The decrypted photo payload is base64 text, sometimes wrapped in a
//! `data:` URI, rather than raw image bytes.

use fmd_crypto::decode_base64;

use crate::error::{ClientError, Result};

/// Decode a decrypted payload into image bytes and, if declared, its MIME type.
pub fn decode_photo_payload(plaintext: &[u8]) -> Result<(Vec<u8>, Option<String>)> {
    let Ok(text) = std::str::from_utf8(plaintext) else {
        // Some agents upload raw bytes; accept them if they look like an image.
        return match sniff_mime(plaintext) {
            Some(_) => Ok((plaintext.to_vec(), None)),
            None => Err(ClientError::InvalidResponse(
                "photo payload is neither base64 nor a known image".into(),
            )),
        };
    };
    let text = text.trim();

    if let Some(rest) = text.strip_prefix("data:") {
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| ClientError::InvalidResponse("malformed data URI".into()))?;
        let mime = header
            .split(';')
            .next()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        let bytes = decode_base64(data)?;
        return Ok((bytes, mime));
    }

    Ok((decode_base64(text)?, None))
}

/// Identify common image formats from their magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [_, _, _, _, b'f', b't', b'y', b'p', b'h', b'e', b'i', b'c', ..] => Some("image/heic"),
        _ => None,
    }
}

pub fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/heic" => "heic",
        _ => "bin",
    }
}
