//! gzip and Base64 helpers used to store and transport images.
//!
//! All functions are pure byte-to-byte transforms. Errors name the stage that
//! failed and carry the underlying cause.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Size of the buffer used when streaming decompressed data into a writer.
const DECOMPRESS_CHUNK: usize = 4096;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("could not compress with gzip: {0}")]
    GzipWrite(#[source] io::Error),
    #[error("could not initialise gzip: {0}")]
    GzipHeader(#[source] io::Error),
    #[error("could not read data with gzip: {0}")]
    GzipRead(#[source] io::Error),
    #[error("could not write decompressed data: {0}")]
    Write(#[source] io::Error),
    #[error("could not decode Base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Compresses `raw_data` into a gzip container.
pub fn compress(raw_data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw_data).map_err(CodecError::GzipWrite)?;
    encoder.finish().map_err(CodecError::GzipWrite)
}

/// Decompresses a gzip container produced by [`compress`] (or any gzip tool).
pub fn decompress(compressed_data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut data = Vec::new();
    decompress_into(compressed_data, &mut data)?;
    Ok(data)
}

/// Decompresses a gzip container straight into `dest`, returning the number of
/// bytes written.
///
/// Concatenated gzip members are all decoded, one after another. Anything that
/// follows a member and is not itself a gzip member is a read error.
///
/// Output is produced in fixed-size chunks, so the whole image never has to be
/// held in memory.
pub fn decompress_into<W: Write + ?Sized>(
    compressed_data: &[u8],
    dest: &mut W,
) -> Result<u64, CodecError> {
    let mut decoder = MultiGzDecoder::new(compressed_data);
    let mut seen_header = decoder.header().is_some();
    let mut buffer = [0u8; DECOMPRESS_CHUNK];
    let mut written = 0u64;
    loop {
        let n = match decoder.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            // Until the first header has been parsed, any failure is a header failure.
            Err(e) if !seen_header && decoder.header().is_none() => {
                return Err(CodecError::GzipHeader(e));
            }
            Err(e) => return Err(CodecError::GzipRead(e)),
        };
        seen_header = true;
        dest.write_all(&buffer[..n]).map_err(CodecError::Write)?;
        written += n as u64;
    }
    if !seen_header && decoder.header().is_none() {
        return Err(CodecError::GzipHeader(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "missing gzip header",
        )));
    }
    dest.flush().map_err(CodecError::Write)?;
    Ok(written)
}

/// Encodes `raw_data` with the standard, padded Base64 alphabet.
pub fn encode_b64(raw_data: &[u8]) -> Vec<u8> {
    STANDARD.encode(raw_data).into_bytes()
}

/// Decodes standard, padded Base64. Line breaks (`\r`, `\n`) are skipped, so
/// wrapped output and a trailing newline decode fine; any other byte outside
/// the alphabet is an error.
pub fn decode_b64(b64_data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let unwrapped: Vec<u8> = b64_data
        .iter()
        .copied()
        .filter(|&b| b != b'\r' && b != b'\n')
        .collect();
    Ok(STANDARD.decode(unwrapped)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;
    use rand_core::{RngCore, SeedableRng};

    fn sample_buffers() -> Vec<Vec<u8>> {
        let mut rng = ChaCha8Rng::from_seed([11u8; 32]);
        let mut random = vec![0u8; 10_000];
        rng.fill_bytes(&mut random);
        vec![
            Vec::new(),
            vec![0],
            b"hello, heatmap".to_vec(),
            vec![0xFF; 1 << 16],
            random,
        ]
    }

    #[test]
    fn compress_round_trips() {
        for data in sample_buffers() {
            let compressed = compress(&data).expect("compression should succeed");
            let restored = decompress(&compressed).expect("decompression should succeed");
            assert_eq!(restored, data, "round trip changed a {} byte buffer", data.len());
        }
    }

    #[test]
    fn compress_shrinks_constant_data() {
        let data = vec![0u8; 1 << 20];
        let compressed = compress(&data).unwrap();
        assert!(
            compressed.len() < data.len() / 100,
            "1 MiB of zeroes compressed to {} bytes",
            compressed.len()
        );
    }

    #[test]
    fn decompress_into_streams_to_writer() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i * 7 % 256) as u8).collect();
        let compressed = compress(&data).unwrap();

        let mut out = tempfile::tempfile().unwrap();
        let written = decompress_into(&compressed, &mut out).unwrap();
        assert_eq!(written, data.len() as u64);

        let mut sink = Vec::new();
        let written = decompress_into(&compressed, &mut sink).unwrap();
        assert_eq!(written, data.len() as u64);
        assert_eq!(sink, data);
    }

    #[test]
    fn decompress_rejects_bad_header() {
        match decompress(b"definitely not gzip") {
            Err(CodecError::GzipHeader(_)) => {}
            other => panic!("Expected GzipHeader error, got {:?}", other),
        }
        match decompress(&[]) {
            Err(CodecError::GzipHeader(_)) => {}
            other => panic!("Expected GzipHeader error for empty input, got {:?}", other),
        }
    }

    #[test]
    fn decompress_rejects_corrupt_body() {
        let data = vec![0x5Au8; 4096];
        let mut compressed = compress(&data).unwrap();
        // The trailer holds the CRC32 of the data followed by its length.
        let crc_pos = compressed.len() - 8;
        compressed[crc_pos] ^= 0xFF;
        match decompress(&compressed) {
            Err(CodecError::GzipRead(_)) => {}
            other => panic!("Expected GzipRead error for bad checksum, got {:?}", other),
        }
    }

    #[test]
    fn decompress_reads_every_member() {
        let mut stream = compress(b"first-").unwrap();
        stream.extend(compress(b"second").unwrap());
        assert_eq!(decompress(&stream).unwrap(), b"first-second");

        let mut with_empty_member = compress(b"").unwrap();
        with_empty_member.extend(compress(b"tail").unwrap());
        assert_eq!(decompress(&with_empty_member).unwrap(), b"tail");
    }

    #[test]
    fn decompress_rejects_trailing_junk() {
        let mut stream = compress(b"payload").unwrap();
        stream.extend_from_slice(b"GARBAGE");
        match decompress(&stream) {
            Err(CodecError::GzipRead(_)) => {}
            other => panic!("Expected GzipRead error for trailing junk, got {:?}", other),
        }
    }

    #[test]
    fn decompress_into_reports_writer_failure() {
        struct FailingWriter;
        impl Write for FailingWriter {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("disk full"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let compressed = compress(b"some data").unwrap();
        match decompress_into(&compressed, &mut FailingWriter) {
            Err(CodecError::Write(e)) => assert_eq!(e.to_string(), "disk full"),
            other => panic!("Expected Write error, got {:?}", other),
        }
    }

    #[test]
    fn base64_round_trips() {
        for data in sample_buffers() {
            let encoded = encode_b64(&data);
            assert_eq!(decode_b64(&encoded).unwrap(), data);
        }
    }

    #[test]
    fn base64_uses_standard_padded_alphabet() {
        assert_eq!(encode_b64(b""), b"");
        assert_eq!(encode_b64(b"f"), b"Zg==");
        assert_eq!(encode_b64(&[0xFB, 0xFF]), b"+/8=");
    }

    #[test]
    fn base64_skips_line_breaks() {
        assert_eq!(
            decode_b64(b"aGVsbG8s\nIGhlYXRtYXA=\n").unwrap(),
            b"hello, heatmap"
        );
        assert_eq!(decode_b64(b"aGVs\r\nbG8s\r\n").unwrap(), b"hello,");

        let data = vec![0xA5u8; 200];
        let wrapped: Vec<u8> = encode_b64(&data)
            .chunks(76)
            .flat_map(|line| line.iter().copied().chain(std::iter::once(b'\n')))
            .collect();
        assert_eq!(decode_b64(&wrapped).unwrap(), data);
    }

    #[test]
    fn base64_rejects_invalid_alphabet() {
        let err = decode_b64(b"not*base64").unwrap_err();
        assert!(matches!(err, CodecError::Base64(_)), "Got {:?}", err);
        assert!(matches!(decode_b64(b"aGVs bG8s"), Err(CodecError::Base64(_))));
        assert!(matches!(decode_b64(b"aGVs\tbG8s"), Err(CodecError::Base64(_))));
        assert!(err.to_string().starts_with("could not decode Base64"));
    }
}
