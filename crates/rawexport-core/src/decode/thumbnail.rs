//! Embedded preview extraction from TIFF-based RAW containers.
//!
//! Most RAW formats (ARW, CR2, NEF, DNG, ...) are TIFF files that carry one
//! or more JPEG previews next to the sensor data. The previews are referenced
//! from SubIFDs, from IFD1 (the EXIF thumbnail slot) or directly from IFD0.
//! Every reference is collected and the largest valid JPEG wins; if the IFD
//! chain yields nothing, the file is scanned for JPEG markers.

use super::DecodeError;

const TIFF_MAGIC_LE: [u8; 4] = [0x49, 0x49, 0x2A, 0x00]; // II + 42
const TIFF_MAGIC_BE: [u8; 4] = [0x4D, 0x4D, 0x00, 0x2A]; // MM + 42

const TAG_COMPRESSION: u16 = 0x0103;
const TAG_STRIP_OFFSETS: u16 = 0x0111;
const TAG_STRIP_BYTE_COUNTS: u16 = 0x0117;
const TAG_SUBIFD: u16 = 0x014A;
const TAG_JPEG_OFFSET: u16 = 0x0201;
const TAG_JPEG_LENGTH: u16 = 0x0202;

const COMPRESSION_JPEG_OLD: u32 = 6;
const COMPRESSION_JPEG: u32 = 7;

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

const MAX_IFD_ENTRIES: u16 = 1000;
const MAX_SUBIFDS: u32 = 16;
// Marker scanning skips the TIFF structure and ignores tiny EXIF thumbnails.
const SCAN_START: usize = 8192;
const SCAN_MIN_PREVIEW: usize = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy)]
struct IfdEntry {
    tag: u16,
    count: u32,
    value: u32,
}

#[derive(Debug, Default)]
struct Ifd {
    entries: Vec<IfdEntry>,
    next: u32,
}

impl Ifd {
    fn get(&self, tag: u16) -> Option<IfdEntry> {
        self.entries.iter().copied().find(|e| e.tag == tag)
    }

    fn value(&self, tag: u16) -> Option<u32> {
        self.get(tag).map(|e| e.value)
    }

    /// JPEG bytes this directory points at, via JPEGInterchangeFormat or a
    /// single JPEG-compressed strip.
    fn jpeg<'a>(&self, bytes: &'a [u8]) -> Option<&'a [u8]> {
        if let (Some(offset), Some(length)) =
            (self.value(TAG_JPEG_OFFSET), self.value(TAG_JPEG_LENGTH))
        {
            if let Some(data) = jpeg_slice(bytes, offset, length) {
                return Some(data);
            }
        }

        let compressed = matches!(
            self.value(TAG_COMPRESSION),
            Some(COMPRESSION_JPEG) | Some(COMPRESSION_JPEG_OLD)
        );
        match (compressed, self.get(TAG_STRIP_OFFSETS), self.get(TAG_STRIP_BYTE_COUNTS)) {
            (true, Some(offsets), Some(counts)) if offsets.count == 1 && counts.count == 1 => {
                jpeg_slice(bytes, offsets.value, counts.value)
            }
            _ => None,
        }
    }
}

struct TiffReader<'a> {
    bytes: &'a [u8],
    order: ByteOrder,
}

impl<'a> TiffReader<'a> {
    fn new(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        let header = bytes
            .get(0..4)
            .ok_or_else(|| DecodeError::CorruptedFile("File shorter than a TIFF header".into()))?;
        let order = if header == TIFF_MAGIC_LE {
            ByteOrder::Little
        } else if header == TIFF_MAGIC_BE {
            ByteOrder::Big
        } else {
            return Err(DecodeError::InvalidFormat);
        };
        Ok(Self { bytes, order })
    }

    fn u16_at(&self, offset: usize) -> Result<u16, DecodeError> {
        let raw: [u8; 2] = self
            .bytes
            .get(offset..offset + 2)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| DecodeError::CorruptedFile(format!("u16 read past end at {offset}")))?;
        Ok(match self.order {
            ByteOrder::Little => u16::from_le_bytes(raw),
            ByteOrder::Big => u16::from_be_bytes(raw),
        })
    }

    fn u32_at(&self, offset: usize) -> Result<u32, DecodeError> {
        let raw: [u8; 4] = self
            .bytes
            .get(offset..offset + 4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| DecodeError::CorruptedFile(format!("u32 read past end at {offset}")))?;
        Ok(match self.order {
            ByteOrder::Little => u32::from_le_bytes(raw),
            ByteOrder::Big => u32::from_be_bytes(raw),
        })
    }

    fn first_ifd(&self) -> Result<u32, DecodeError> {
        self.u32_at(4)
    }

    fn read_ifd(&self, offset: u32) -> Result<Ifd, DecodeError> {
        let base = offset as usize;
        let count = self.u16_at(base)?;
        if count > MAX_IFD_ENTRIES {
            return Err(DecodeError::CorruptedFile(format!(
                "IFD at {offset} claims {count} entries"
            )));
        }

        let mut entries = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let at = base + 2 + i * 12;
            let entry = IfdEntry {
                tag: self.u16_at(at)?,
                count: self.u32_at(at + 4)?,
                value: self.u32_at(at + 8)?,
            };
            // Short values are stored left-aligned in the 4-byte slot.
            let entry = match (self.u16_at(at + 2)?, self.order) {
                (3, ByteOrder::Big) if entry.count == 1 => IfdEntry {
                    value: entry.value >> 16,
                    ..entry
                },
                (3, ByteOrder::Little) if entry.count == 1 => IfdEntry {
                    value: entry.value & 0xFFFF,
                    ..entry
                },
                _ => entry,
            };
            entries.push(entry);
        }

        let next = self.u32_at(base + 2 + count as usize * 12).unwrap_or(0);
        Ok(Ifd { entries, next })
    }

    /// SubIFD offsets: inline when there is one, an offset array otherwise.
    fn sub_ifds(&self, ifd: &Ifd) -> Vec<u32> {
        match ifd.get(TAG_SUBIFD) {
            Some(e) if e.count == 1 => vec![e.value],
            Some(e) if e.count > 1 => (0..e.count.min(MAX_SUBIFDS))
                .filter_map(|i| self.u32_at(e.value as usize + i as usize * 4).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn jpeg_slice(bytes: &[u8], offset: u32, length: u32) -> Option<&[u8]> {
    let start = offset as usize;
    let end = start.checked_add(length as usize)?;
    if length == 0 {
        return None;
    }
    bytes.get(start..end).filter(|d| d.starts_with(&JPEG_SOI))
}

/// Check if bytes start with a TIFF header (the container most RAW formats use).
pub fn is_tiff_container(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && (bytes[..4] == TIFF_MAGIC_LE || bytes[..4] == TIFF_MAGIC_BE)
}

/// Extract the largest embedded JPEG preview from a RAW file.
///
/// Non-TIFF containers (RAF, CR3, ...) go straight to the marker scan.
///
/// # Errors
///
/// - `DecodeError::InvalidFormat` - the bytes are themselves a JPEG
/// - `DecodeError::CorruptedFile` - IFD0 cannot be read
/// - `DecodeError::NoThumbnail` - no JPEG preview anywhere in the file
pub fn extract_embedded_jpeg(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if bytes.starts_with(&JPEG_SOI) {
        return Err(DecodeError::InvalidFormat);
    }
    if !is_tiff_container(bytes) {
        return scan_for_jpeg(bytes)
            .map(<[u8]>::to_vec)
            .ok_or(DecodeError::NoThumbnail);
    }

    let reader = TiffReader::new(bytes)?;
    let ifd0 = reader.read_ifd(reader.first_ifd()?)?;

    let mut candidates: Vec<&[u8]> = Vec::new();
    for offset in reader.sub_ifds(&ifd0) {
        if let Some(jpeg) = reader.read_ifd(offset).ok().and_then(|ifd| ifd.jpeg(bytes)) {
            candidates.push(jpeg);
        }
    }
    if ifd0.next != 0 {
        if let Some(jpeg) = reader.read_ifd(ifd0.next).ok().and_then(|ifd| ifd.jpeg(bytes)) {
            candidates.push(jpeg);
        }
    }
    if let Some(jpeg) = ifd0.jpeg(bytes) {
        candidates.push(jpeg);
    }

    candidates
        .into_iter()
        .max_by_key(|c| c.len())
        .or_else(|| scan_for_jpeg(bytes))
        .map(<[u8]>::to_vec)
        .ok_or(DecodeError::NoThumbnail)
}

/// Last resort: look for an SOI..EOI run large enough to be a real preview.
fn scan_for_jpeg(bytes: &[u8]) -> Option<&[u8]> {
    let mut start = SCAN_START.min(bytes.len());
    while let Some(rel) = find(&bytes[start..], &JPEG_SOI) {
        let soi = start + rel;
        let mut search = soi + 2;
        while let Some(rel_end) = find(&bytes[search..], &JPEG_EOI) {
            let end = search + rel_end + 2;
            if end - soi > SCAN_MIN_PREVIEW {
                return Some(&bytes[soi..end]);
            }
            search = end;
        }
        start = soi + 2;
    }
    None
}

fn find(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Little-endian TIFF builder for synthetic containers.
    struct TiffBuilder {
        data: Vec<u8>,
    }

    impl TiffBuilder {
        fn new() -> Self {
            let mut data = TIFF_MAGIC_LE.to_vec();
            data.extend_from_slice(&8u32.to_le_bytes());
            Self { data }
        }

        /// Append an IFD (type LONG for every entry) and return its offset.
        fn ifd(&mut self, entries: &[(u16, u32, u32)], next: u32) -> u32 {
            let offset = self.data.len() as u32;
            self.data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
            for &(tag, count, value) in entries {
                self.data.extend_from_slice(&tag.to_le_bytes());
                self.data.extend_from_slice(&4u16.to_le_bytes());
                self.data.extend_from_slice(&count.to_le_bytes());
                self.data.extend_from_slice(&value.to_le_bytes());
            }
            self.data.extend_from_slice(&next.to_le_bytes());
            offset
        }

        fn blob(&mut self, len: usize) -> u32 {
            let offset = self.data.len() as u32;
            let mut blob = vec![0xAB; len];
            blob[0..2].copy_from_slice(&JPEG_SOI);
            let n = blob.len();
            blob[n - 2..].copy_from_slice(&JPEG_EOI);
            self.data.extend_from_slice(&blob);
            offset
        }
    }

    #[test]
    fn test_is_tiff_container() {
        assert!(is_tiff_container(&[0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00]));
        assert!(is_tiff_container(&[0x4D, 0x4D, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]));
        assert!(!is_tiff_container(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(!is_tiff_container(&[0x49, 0x49]));
        assert!(!is_tiff_container(&[]));
    }

    #[test]
    fn test_non_tiff_is_invalid_format() {
        let result = extract_embedded_jpeg(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]);
        assert!(matches!(result, Err(DecodeError::InvalidFormat)));
    }

    #[test]
    fn test_non_tiff_container_is_scanned() {
        let mut data = b"FUJIFILMCCD-RAW ".to_vec();
        data.resize(SCAN_START + 16, 0);
        data.extend_from_slice(&JPEG_SOI);
        data.extend_from_slice(&vec![0x11; SCAN_MIN_PREVIEW]);
        data.extend_from_slice(&JPEG_EOI);
        assert_eq!(
            extract_embedded_jpeg(&data).unwrap().len(),
            SCAN_MIN_PREVIEW + 4
        );
        assert!(matches!(
            extract_embedded_jpeg(b"not an image at all"),
            Err(DecodeError::NoThumbnail)
        ));
    }

    #[test]
    fn test_empty_ifd_has_no_thumbnail() {
        let mut b = TiffBuilder::new();
        b.ifd(&[], 0);
        assert!(matches!(extract_embedded_jpeg(&b.data), Err(DecodeError::NoThumbnail)));
    }

    #[test]
    fn test_truncated_ifd_is_corrupted() {
        let mut data = TIFF_MAGIC_LE.to_vec();
        data.extend_from_slice(&8u32.to_le_bytes());
        data.push(0x00);
        assert!(matches!(
            extract_embedded_jpeg(&data),
            Err(DecodeError::CorruptedFile(_))
        ));
    }

    #[test]
    fn test_jpeg_interchange_in_ifd0() {
        let mut b = TiffBuilder::new();
        // IFD0 with two entries lives at 8; the blob follows it.
        let blob_at = 8 + 2 + 2 * 12 + 4;
        b.ifd(&[(TAG_JPEG_OFFSET, 1, blob_at), (TAG_JPEG_LENGTH, 1, 64)], 0);
        assert_eq!(b.blob(64), blob_at);

        let jpeg = extract_embedded_jpeg(&b.data).unwrap();
        assert_eq!(jpeg.len(), 64);
        assert_eq!(&jpeg[0..2], &JPEG_SOI);
    }

    #[test]
    fn test_largest_candidate_wins() {
        let mut b = TiffBuilder::new();
        // IFD0: small JPEG inline, SubIFD pointer, next = IFD1.
        let ifd0_len = 2 + 3 * 12 + 4;
        let small_at = 8 + ifd0_len;
        let sub_ifd_at = small_at + 32;
        let large_at = sub_ifd_at + 2 + 3 * 12 + 4;
        b.ifd(
            &[
                (TAG_JPEG_OFFSET, 1, small_at),
                (TAG_JPEG_LENGTH, 1, 32),
                (TAG_SUBIFD, 1, sub_ifd_at),
            ],
            0,
        );
        b.blob(32);
        b.ifd(
            &[
                (TAG_COMPRESSION, 1, COMPRESSION_JPEG),
                (TAG_STRIP_OFFSETS, 1, large_at),
                (TAG_STRIP_BYTE_COUNTS, 1, 500),
            ],
            0,
        );
        assert_eq!(b.blob(500), large_at);

        assert_eq!(extract_embedded_jpeg(&b.data).unwrap().len(), 500);
    }

    #[test]
    fn test_uncompressed_strip_is_ignored() {
        let mut b = TiffBuilder::new();
        let blob_at = 8 + 2 + 3 * 12 + 4;
        b.ifd(
            &[
                (TAG_COMPRESSION, 1, 1),
                (TAG_STRIP_OFFSETS, 1, blob_at),
                (TAG_STRIP_BYTE_COUNTS, 1, 64),
            ],
            0,
        );
        b.blob(64);
        assert!(matches!(extract_embedded_jpeg(&b.data), Err(DecodeError::NoThumbnail)));
    }

    #[test]
    fn test_out_of_bounds_reference_is_skipped() {
        let mut b = TiffBuilder::new();
        b.ifd(&[(TAG_JPEG_OFFSET, 1, 10_000), (TAG_JPEG_LENGTH, 1, 64)], 0);
        assert!(matches!(extract_embedded_jpeg(&b.data), Err(DecodeError::NoThumbnail)));
    }

    #[test]
    fn test_big_endian_short_value() {
        let mut data = TIFF_MAGIC_BE.to_vec();
        data.extend_from_slice(&8u32.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&TAG_COMPRESSION.to_be_bytes());
        data.extend_from_slice(&3u16.to_be_bytes()); // SHORT
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x07, 0x00, 0x00]);
        data.extend_from_slice(&0u32.to_be_bytes());

        let reader = TiffReader::new(&data).unwrap();
        let ifd = reader.read_ifd(8).unwrap();
        assert_eq!(ifd.value(TAG_COMPRESSION), Some(COMPRESSION_JPEG));
    }

    #[test]
    fn test_marker_scan_fallback() {
        let mut b = TiffBuilder::new();
        b.ifd(&[], 0);
        b.data.resize(SCAN_START + 100, 0);
        b.blob(SCAN_MIN_PREVIEW + 10);
        assert_eq!(
            extract_embedded_jpeg(&b.data).unwrap().len(),
            SCAN_MIN_PREVIEW + 10
        );
    }

    #[test]
    fn test_marker_scan_ignores_small_runs() {
        let mut data = vec![0u8; SCAN_START + 10];
        data.extend_from_slice(&JPEG_SOI);
        data.extend_from_slice(&[0u8; 100]);
        data.extend_from_slice(&JPEG_EOI);
        assert!(scan_for_jpeg(&data).is_none());
    }
}
