use crate::CsvResult;
use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, BufReader};
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;

use crate::codec::Transcoder;

/// How the bytes of an upload should be read.
#[derive(Debug, Clone)]
pub struct CsvMeta {
    /// e.g. "gzip", "zstd", or empty for a plain upload
    pub content_encoding: String,
    /// Which character encoding to expect (defaults to UTF-8)
    pub charset: &'static encoding_rs::Encoding,
}

impl Default for CsvMeta {
    fn default() -> Self {
        Self {
            content_encoding: String::new(),
            charset: encoding_rs::UTF_8,
        }
    }
}

impl CsvMeta {
    fn is_gzip(&self) -> bool {
        self.encodings().any(|e| e == "gzip" || e == "x-gzip")
    }

    fn is_zstd(&self) -> bool {
        self.encodings().any(|e| e == "zstd")
    }

    fn encodings(&self) -> impl Iterator<Item = String> + '_ {
        self.content_encoding
            .split(',')
            .map(|s| s.trim().to_ascii_lowercase())
    }
}

/// True when the file name carries a `.csv` extension (any case).
pub fn has_csv_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Resolves a WHATWG encoding label such as `utf-8` or `windows-1252`.
pub fn charset_for_label(label: &str) -> Option<&'static encoding_rs::Encoding> {
    encoding_rs::Encoding::for_label(label.trim().as_bytes())
}

/// Wraps a raw upload stream with optional decompression and UTF-8 transcoding.
pub fn build_csv_reader<R>(raw: R, meta: &CsvMeta) -> impl AsyncRead + Unpin + Send
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buf = BufReader::with_capacity(1 << 16, raw);
    let decompressed: Box<dyn AsyncRead + Unpin + Send> = if meta.is_gzip() {
        Box::new(GzipDecoder::new(buf))
    } else if meta.is_zstd() {
        Box::new(ZstdDecoder::new(buf))
    } else {
        Box::new(buf)
    };

    // UTF-8 passes through untouched; the parser strips its BOM from the header.
    if meta.charset == encoding_rs::UTF_8 {
        decompressed
    } else {
        let framed = FramedRead::new(decompressed, Transcoder::new(meta.charset));
        Box::new(StreamReader::new(framed)) as Box<dyn AsyncRead + Unpin + Send>
    }
}

/// Opens a stored upload, decoding it as its metadata describes.
pub async fn open_upload(path: &Path, meta: &CsvMeta) -> CsvResult<impl AsyncRead + Unpin + Send> {
    let file = File::open(path).await?;
    Ok(build_csv_reader(file, meta))
}
