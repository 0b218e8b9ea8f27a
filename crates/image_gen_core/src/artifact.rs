const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
const JPEG_SOI: &[u8] = &[0xff, 0xd8, 0xff];

/// Image encoding of a generated artifact, sniffed from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Unknown,
}

impl ImageFormat {
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(PNG_SIGNATURE) {
            Self::Png
        } else if bytes.starts_with(JPEG_SOI) {
            Self::Jpeg
        } else {
            Self::Unknown
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Unknown => "application/octet-stream",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Unknown => "bin",
        }
    }
}
