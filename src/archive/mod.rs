//! Single-member extraction from registry tarballs and zip package stores.
//!
//! The tarball reader understands only the subset of ustar that registry
//! packaging produces: a 100-byte NUL-terminated name and an octal size
//! field. Long-name, PAX and sparse entries are rejected instead of being
//! silently mis-read.

pub mod zip;

use flate2::read::GzDecoder;
use log::debug;
use std::io::Read;

use crate::error::ArchiveError;

const BLOCK_SIZE: usize = 512;
const NAME_FIELD: std::ops::Range<usize> = 0..100;
const SIZE_FIELD: std::ops::Range<usize> = 124..136;
const TYPE_FLAG: usize = 156;

/// Parsed view of one tar header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarHeader {
    pub name: String,
    pub size: usize,
}

/// Decompress `gzip_bytes` and return the contents of the member named `member_path`.
#[tracing::instrument(skip(gzip_bytes))]
pub fn extract_member(gzip_bytes: &[u8], member_path: &str) -> Result<Vec<u8>, ArchiveError> {
    let mut tar = Vec::new();
    GzDecoder::new(gzip_bytes)
        .read_to_end(&mut tar)
        .map_err(|e| ArchiveError::InvalidGzip(e.to_string()))?;
    debug!("Decompressed {} bytes of tar data", tar.len());

    find_member(&tar, member_path).map(<[u8]>::to_vec)
}

/// Scan an uncompressed tar buffer for `member_path`.
pub fn find_member<'a>(tar: &'a [u8], member_path: &str) -> Result<&'a [u8], ArchiveError> {
    let mut offset = 0;

    while offset + BLOCK_SIZE <= tar.len() {
        let block = &tar[offset..offset + BLOCK_SIZE];
        if block.iter().all(|&b| b == 0) {
            // End-of-archive marker
            break;
        }

        let header = parse_header(block, offset)?;
        let data_start = offset + BLOCK_SIZE;
        let data_end = data_start
            .checked_add(header.size)
            .filter(|&end| end <= tar.len())
            .ok_or_else(|| ArchiveError::MalformedHeader {
                offset,
                reason: format!(
                    "member \"{}\" claims {} bytes but the archive is truncated",
                    header.name, header.size
                ),
            })?;

        if header.name == member_path {
            debug!("Found {} ({} bytes) at offset {}", member_path, header.size, offset);
            return Ok(&tar[data_start..data_end]);
        }

        offset = data_start + round_up(header.size);
    }

    Err(ArchiveError::MemberNotFound {
        path: member_path.to_string(),
    })
}

/// Parse the name and size fields of a header block starting at `offset`.
pub fn parse_header(block: &[u8], offset: usize) -> Result<TarHeader, ArchiveError> {
    let name = c_str(&block[NAME_FIELD]);

    let kind = block[TYPE_FLAG];
    if matches!(kind, b'L' | b'K' | b'x' | b'g' | b'S') {
        return Err(ArchiveError::UnsupportedEntry {
            offset,
            name,
            kind: kind as char,
        });
    }

    let size = parse_octal(&block[SIZE_FIELD]).ok_or_else(|| ArchiveError::MalformedHeader {
        offset,
        reason: format!(
            "size field {:?} of \"{}\" is not an octal number",
            String::from_utf8_lossy(&block[SIZE_FIELD]),
            name
        ),
    })?;

    Ok(TarHeader { name, size })
}

fn c_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Octal digits, optionally padded with spaces and terminated by NUL or space.
fn parse_octal(field: &[u8]) -> Option<usize> {
    let text = c_str(field);
    let digits = text.trim_matches(' ');
    if digits.is_empty() || !digits.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return None;
    }
    usize::from_str_radix(digits, 8).ok()
}

fn round_up(size: usize) -> usize {
    size.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{gzip, tar_gz};

    fn raw_header(name: &str, size_field: &[u8], kind: u8) -> Vec<u8> {
        let mut block = vec![0u8; BLOCK_SIZE];
        block[..name.len()].copy_from_slice(name.as_bytes());
        block[124..124 + size_field.len()].copy_from_slice(size_field);
        block[TYPE_FLAG] = kind;
        block
    }

    #[test]
    fn test_extract_member_returns_exact_bytes() {
        let tool = b"\x7fELF pretend binary".to_vec();
        let archive = tar_gz(&[
            ("package/a", b"first member".as_slice()),
            ("package/bin/tool", tool.as_slice()),
        ]);

        assert_eq!(extract_member(&archive, "package/bin/tool").unwrap(), tool);
        assert_eq!(
            extract_member(&archive, "package/a").unwrap(),
            b"first member"
        );
    }

    #[test]
    fn test_extract_member_missing() {
        let archive = tar_gz(&[
            ("package/a", b"first member".as_slice()),
            ("package/bin/tool", b"tool".as_slice()),
        ]);

        let err = extract_member(&archive, "package/missing").unwrap_err();
        assert!(matches!(err, ArchiveError::MemberNotFound { ref path } if path == "package/missing"));
    }

    #[test]
    fn test_extract_member_spans_multiple_blocks() {
        let big: Vec<u8> = (0..1500u32).map(|i| (i % 251) as u8).collect();
        let archive = tar_gz(&[
            ("package/big", big.as_slice()),
            ("package/bin/tool", b"after big".as_slice()),
        ]);

        assert_eq!(extract_member(&archive, "package/big").unwrap(), big);
        assert_eq!(
            extract_member(&archive, "package/bin/tool").unwrap(),
            b"after big"
        );
    }

    #[test]
    fn test_extract_member_empty_member() {
        let archive = tar_gz(&[
            ("package/empty", b"".as_slice()),
            ("package/bin/tool", b"x".as_slice()),
        ]);

        assert!(extract_member(&archive, "package/empty").unwrap().is_empty());
        assert_eq!(extract_member(&archive, "package/bin/tool").unwrap(), b"x");
    }

    #[test]
    fn test_invalid_gzip() {
        let err = extract_member(b"definitely not gzip", "package/bin/tool").unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidGzip(_)));
    }

    #[test]
    fn test_non_octal_size_aborts_scan() {
        let mut tar = raw_header("package/a", b"12x4567\0", b'0');
        tar.extend(vec![0u8; BLOCK_SIZE * 4]);

        let err = extract_member(&gzip(&tar), "package/bin/tool").unwrap_err();
        assert!(matches!(err, ArchiveError::MalformedHeader { offset: 0, .. }));
    }

    #[test]
    fn test_blank_size_field_is_malformed() {
        let mut tar = raw_header("package/a", b"", b'0');
        tar.extend(vec![0u8; BLOCK_SIZE]);

        let err = find_member(&tar, "package/bin/tool").unwrap_err();
        assert!(matches!(err, ArchiveError::MalformedHeader { .. }));
    }

    #[test]
    fn test_truncated_member_is_malformed() {
        // Claims 0o1000 = 512 bytes but only 10 follow
        let mut tar = raw_header("package/bin/tool", b"00000001000\0", b'0');
        tar.extend(vec![1u8; 10]);

        let err = find_member(&tar, "package/bin/tool").unwrap_err();
        assert!(matches!(err, ArchiveError::MalformedHeader { .. }));
    }

    #[test]
    fn test_huge_size_does_not_overflow() {
        let mut tar = raw_header("package/a", b"77777777777\0", b'0');
        tar.extend(vec![0u8; BLOCK_SIZE]);

        let err = find_member(&tar, "package/bin/tool").unwrap_err();
        assert!(matches!(err, ArchiveError::MalformedHeader { .. }));
    }

    #[test]
    fn test_long_name_entries_are_rejected() {
        let mut tar = raw_header("././@LongLink", b"00000000012\0", b'L');
        tar.extend(vec![0u8; BLOCK_SIZE * 3]);

        let err = find_member(&tar, "package/bin/tool").unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedEntry { kind: 'L', .. }));
    }

    #[test]
    fn test_space_padded_size_field() {
        let mut tar = raw_header("package/bin/tool", b"     3 \0", b'0');
        let mut data = b"abc".to_vec();
        data.resize(BLOCK_SIZE, 0);
        tar.extend(data);

        assert_eq!(find_member(&tar, "package/bin/tool").unwrap(), b"abc");
    }

    #[test]
    fn test_trailing_partial_block_ends_scan() {
        let tar = vec![7u8; 100];
        let err = find_member(&tar, "package/bin/tool").unwrap_err();
        assert!(matches!(err, ArchiveError::MemberNotFound { .. }));
    }

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(0), 0);
        assert_eq!(round_up(1), 512);
        assert_eq!(round_up(512), 512);
        assert_eq!(round_up(513), 1024);
    }
}
