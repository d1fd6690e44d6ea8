//! Length-prefixed framing used on every call.
//!
//! Each frame is a little-endian `u32` length followed by that many payload
//! bytes. A zero length is reserved for the end-of-stream marker, so data
//! frames must never be empty. Lengths above [`MAX_FRAME_LEN`] are rejected
//! before any buffer space is reserved for them.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

const LEN_PREFIX: usize = 4;

/// Largest payload accepted in either direction.
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data(Bytes),
    /// No further frames will follow in this direction.
    End,
}

impl Frame {
    pub fn data(payload: impl Into<Bytes>) -> Self {
        Frame::Data(payload.into())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        if src.len() < LEN_PREFIX {
            return Ok(None);
        }

        let len = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if len == 0 {
            src.advance(LEN_PREFIX);
            return Ok(Some(Frame::End));
        }
        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit"),
            ));
        }

        if src.len() < LEN_PREFIX + len {
            // Need more data
            src.reserve(LEN_PREFIX + len - src.len());
            return Ok(None);
        }

        src.advance(LEN_PREFIX);
        Ok(Some(Frame::Data(src.split_to(len).freeze())))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), io::Error> {
        match frame {
            Frame::End => dst.put_u32_le(0),
            Frame::Data(payload) => {
                if payload.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "empty data frame collides with the end-of-stream marker",
                    ));
                }
                if payload.len() > MAX_FRAME_LEN {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("frame of {} bytes exceeds the {MAX_FRAME_LEN} byte limit", payload.len()),
                    ));
                }
                dst.reserve(LEN_PREFIX + payload.len());
                dst.put_u32_le(payload.len() as u32);
                dst.extend_from_slice(&payload);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_frame(payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(4 + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn decode_waits_for_complete_frame() {
        let mut codec = FrameCodec;
        let full = encode_frame(b"stream");
        let mut buf = BytesMut::from(&full[..6]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(&full[6..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Data(Bytes::from_static(b"stream")))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_splits_back_to_back_frames_and_end_marker() {
        let mut codec = FrameCodec;
        let mut raw = encode_frame(b"one");
        raw.extend_from_slice(&encode_frame(b"two"));
        raw.extend_from_slice(&[0, 0, 0, 0]);
        let mut buf = BytesMut::from(&raw[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::data(&b"one"[..])));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::data(&b"two"[..])));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::End));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn decode_eof_with_leftover_bytes_is_an_error() {
        let mut codec = FrameCodec;
        let mut partial = encode_frame(b"incomplete");
        partial.truncate(6);
        let mut buf = BytesMut::from(&partial[..]);

        assert!(codec.decode_eof(&mut buf).is_err());
    }

    #[test]
    fn encode_writes_prefix_and_end_marker() {
        let mut codec = FrameCodec;
        let mut dst = BytesMut::new();

        codec.encode(Frame::data(&b"hello"[..]), &mut dst).unwrap();
        codec.encode(Frame::End, &mut dst).unwrap();

        let mut expected = encode_frame(b"hello");
        expected.extend_from_slice(&[0, 0, 0, 0]);
        assert_eq!(&dst[..], &expected[..]);
    }

    #[test]
    fn encode_rejects_empty_data_frame() {
        let mut codec = FrameCodec;
        let mut dst = BytesMut::new();

        let err = codec.encode(Frame::data(Bytes::new()), &mut dst).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(dst.is_empty());
    }

    #[test]
    fn decode_rejects_oversized_length_without_reserving() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        let capacity = buf.capacity();

        let err = codec.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(buf.capacity(), capacity);

        let mut max = BytesMut::from(&[0xFFu8; 4][..]);
        assert!(codec.decode(&mut max).is_err());
    }

    #[test]
    fn decode_accepts_prefix_at_the_limit() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::new();
        buf.put_u32_le(MAX_FRAME_LEN as u32);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let mut codec = FrameCodec;
        let mut dst = BytesMut::new();

        let payload = Bytes::from(vec![1u8; MAX_FRAME_LEN + 1]);
        let err = codec.encode(Frame::Data(payload), &mut dst).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(dst.is_empty());
    }
}
