use std::fmt;
use std::io::Write;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Request body encoding for metric API payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Codec {
    Identity,
    #[default]
    Gzip,
    Zstd,
    /// zlib stream, announced as `deflate`.
    Deflate,
    /// Raw (unframed) snappy block.
    Snappy,
}

impl Codec {
    /// Value for the `Content-Encoding` header, `None` for identity.
    pub const fn content_encoding(self) -> Option<&'static str> {
        match self {
            Self::Identity => None,
            Self::Gzip => Some("gzip"),
            Self::Zstd => Some("zstd"),
            Self::Deflate => Some("deflate"),
            Self::Snappy => Some("snappy"),
        }
    }

    pub fn encode(self, body: Vec<u8>) -> Result<Vec<u8>> {
        let encoded = match self {
            Self::Identity => return Ok(body),
            Self::Gzip => {
                let mut w =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                w.write_all(&body).context("writing gzip stream")?;
                w.finish().context("finishing gzip stream")?
            }
            Self::Deflate => {
                let mut w =
                    flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                w.write_all(&body).context("writing zlib stream")?;
                w.finish().context("finishing zlib stream")?
            }
            Self::Zstd => zstd::encode_all(body.as_slice(), 0).context("zstd encoding")?,
            Self::Snappy => snap::raw::Encoder::new()
                .compress_vec(&body)
                .context("snappy encoding")?,
        };

        Ok(encoded)
    }
}

impl FromStr for Codec {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        Ok(match name {
            "" | "none" => Self::Identity,
            "gzip" => Self::Gzip,
            "zstd" => Self::Zstd,
            "zlib" => Self::Deflate,
            "snappy" => Self::Snappy,
            other => bail!("unsupported compression: {other}"),
        })
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.content_encoding().unwrap_or("identity"))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::config::COMPRESSIONS;

    /// Decodes the way a receiving endpoint would, keyed on the header value.
    fn decode(content_encoding: Option<&str>, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        match content_encoding {
            None => out.extend_from_slice(body),
            Some("gzip") => {
                flate2::read::GzDecoder::new(body)
                    .read_to_end(&mut out)
                    .expect("gunzip");
            }
            Some("deflate") => {
                flate2::read::ZlibDecoder::new(body)
                    .read_to_end(&mut out)
                    .expect("inflate");
            }
            Some("zstd") => out = zstd::decode_all(body).expect("unzstd"),
            Some("snappy") => {
                out = snap::raw::Decoder::new()
                    .decompress_vec(body)
                    .expect("unsnappy")
            }
            Some(other) => panic!("unexpected content encoding {other}"),
        }
        out
    }

    #[test]
    fn test_every_configurable_name_parses_and_is_decodable() {
        let body = br#"[{"common":{},"metrics":[{"name":"spark.job.numtasks","value":10.0}]}]"#;

        for name in COMPRESSIONS {
            let codec: Codec = name.parse().expect("configured codec");
            let encoded = codec.encode(body.to_vec()).expect("encode");
            assert_eq!(
                decode(codec.content_encoding(), &encoded),
                body.as_slice(),
                "{name}"
            );
        }
    }

    #[test]
    fn test_zlib_is_announced_as_deflate() {
        let codec: Codec = "zlib".parse().expect("zlib");
        assert_eq!(codec, Codec::Deflate);
        assert_eq!(codec.content_encoding(), Some("deflate"));
    }

    #[test]
    fn test_identity_passes_body_through() {
        let codec: Codec = "none".parse().expect("none");
        assert_eq!(codec.content_encoding(), None);
        assert_eq!(codec.to_string(), "identity");
        assert_eq!(codec.encode(b"{}".to_vec()).expect("identity"), b"{}");
        assert_eq!("".parse::<Codec>().expect("empty"), Codec::Identity);
    }

    #[test]
    fn test_unknown_name_rejected() {
        let err = "lz4".parse::<Codec>().expect_err("lz4 unsupported");
        assert!(err.to_string().contains("lz4"));
    }
}
