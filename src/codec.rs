use bytes::{Buf, BytesMut};
use std::io;
use tokio_util::codec::Decoder;

/// Streams bytes of a non-UTF-8 upload into UTF-8.
///
/// The underlying `encoding_rs` decoder sniffs a byte-order mark on the first
/// chunk and removes it, switching to the encoding the mark names.
pub struct Transcoder {
    decoder: encoding_rs::Decoder,
    finished: bool,
}

impl Transcoder {
    pub fn new(encoding: &'static encoding_rs::Encoding) -> Self {
        Self {
            decoder: encoding.new_decoder(),
            finished: false,
        }
    }

    fn transcode(&mut self, src: &mut BytesMut, last: bool) -> Option<BytesMut> {
        let capacity = self
            .decoder
            .max_utf8_buffer_length(src.len())
            .unwrap_or_else(|| src.len() * 3);
        let mut out = vec![0u8; capacity];

        // Malformed sequences become U+FFFD; a cell with a stray byte must
        // not fail the whole upload.
        let (_result, read, written, _had_errors) =
            self.decoder.decode_to_utf8(src, &mut out, last);
        src.advance(read);

        if written == 0 {
            None
        } else {
            out.truncate(written);
            Some(BytesMut::from(&out[..]))
        }
    }
}

impl Decoder for Transcoder {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        // `None` means a partial sequence is buffered inside the decoder.
        Ok(self.transcode(src, false))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.finished {
            buf.clear();
            return Ok(None);
        }
        self.finished = true;
        let chunk = self.transcode(buf, true);
        buf.clear();
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_1252_is_transcoded_to_utf8() {
        let mut t = Transcoder::new(encoding_rs::WINDOWS_1252);
        let mut src = BytesMut::from(&b"Caf\xe9,Ni\xf1o\n"[..]);
        let out = t.decode_eof(&mut src).unwrap().unwrap();
        assert_eq!(std::str::from_utf8(&out).unwrap(), "Café,Niño\n");
    }

    #[test]
    fn utf8_bom_is_sniffed_and_removed() {
        let mut t = Transcoder::new(encoding_rs::WINDOWS_1252);
        let mut src = BytesMut::from(&b"\xef\xbb\xbfGrant Number\n"[..]);
        let out = t.decode_eof(&mut src).unwrap().unwrap();
        assert_eq!(std::str::from_utf8(&out).unwrap(), "Grant Number\n");
    }
}
