use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use mdwire_datagram::Datagram;
use mdwire_transport::MdStream;
use tracing::trace;

use crate::codec::{decode_frame, FrameConfig, HEADER_SIZE, MAX_FRAME_PAYLOAD};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete datagrams from any `Read` stream.
///
/// Handles partial reads internally: bytes of an unfinished frame stay
/// buffered across timeouts, so a later call picks up where the last one
/// stopped.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(HEADER_SIZE + MAX_FRAME_PAYLOAD),
            config,
        }
    }

    /// Read the next complete datagram (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when the stream ends,
    /// whether cleanly between frames or partway through one. A read timeout
    /// on the stream surfaces as `FrameError::Io` with `WouldBlock`/`TimedOut`.
    pub fn read_frame(&mut self) -> Result<Datagram> {
        loop {
            if let Some(datagram) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                trace!(len = datagram.len(), "frame received");
                return Ok(datagram);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Bytes received but not yet returned as a datagram.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<MdStream> {
    /// Create a frame reader for `MdStream` and apply read timeout from config.
    pub fn with_config_stream(inner: MdStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }

    /// Change the read timeout for subsequent reads.
    pub fn set_read_timeout(&mut self, timeout: Option<std::time::Duration>) -> Result<()> {
        self.inner
            .set_read_timeout(timeout)
            .map_err(transport_to_frame_error)?;
        self.config.read_timeout = timeout;
        Ok(())
    }
}

pub(crate) fn transport_to_frame_error(err: mdwire_transport::TransportError) -> FrameError {
    match err {
        mdwire_transport::TransportError::Io(io)
        | mdwire_transport::TransportError::Accept(io) => FrameError::Io(io),
        mdwire_transport::TransportError::Bind { source, .. }
        | mdwire_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::encode_frame;

    fn wire(frames: &[&[u8]]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            encode_frame(frame, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[b"hello"])));
        let datagram = reader.read_frame().unwrap();
        assert_eq!(datagram.data(), b"hello");
    }

    #[test]
    fn read_multiple_frames() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[b"one", b"two", b"three"])));

        assert_eq!(reader.read_frame().unwrap().data(), b"one");
        assert_eq!(reader.read_frame().unwrap().data(), b"two");
        assert_eq!(reader.read_frame().unwrap().data(), b"three");
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn read_maximum_size_frame() {
        let payload = vec![0xAB; MAX_FRAME_PAYLOAD];
        let mut reader = FrameReader::new(Cursor::new(wire(&[&payload])));
        let datagram = reader.read_frame().unwrap();
        assert_eq!(datagram.data(), payload.as_slice());
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire(&[b"slow"]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);
        assert_eq!(reader.read_frame().unwrap().data(), b"slow");
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_inside_length_prefix() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x10]));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        partial.put_u16_le(16);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn oversized_frame_in_stream() {
        let mut bytes = BytesMut::new();
        bytes.put_u16_le(1024);

        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(bytes.to_vec()), cfg);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn timeout_keeps_partial_frame_buffered() {
        let full = wire(&[b"split-frame"]);
        let reader = ScriptedReader {
            steps: vec![
                Step::Data(full[..5].to_vec()),
                Step::Err(ErrorKind::WouldBlock),
                Step::Data(full[5..].to_vec()),
            ],
        };
        let mut framed = FrameReader::new(reader);

        let err = framed.read_frame().unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(framed.buffered(), 5);

        assert_eq!(framed.read_frame().unwrap().data(), b"split-frame");
        assert_eq!(framed.buffered(), 0);
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = ScriptedReader {
            steps: vec![Step::Err(ErrorKind::Interrupted), Step::Data(wire(&[b"ok"]))],
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap().data(), b"ok");
    }

    #[test]
    fn other_io_errors_propagate() {
        let reader = ScriptedReader {
            steps: vec![Step::Err(ErrorKind::ConnectionReset)],
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(ref e) if e.kind() == ErrorKind::ConnectionReset));
        assert!(!err.is_timeout());
    }

    #[test]
    #[cfg(unix)]
    fn stream_read_timeout_applies() {
        let (_left, right) = MdStream::pair().unwrap();
        let cfg = FrameConfig {
            read_timeout: Some(Duration::from_millis(20)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_stream(right, cfg).unwrap();

        let err = reader.read_frame().unwrap_err();
        assert!(err.is_timeout());

        reader
            .set_read_timeout(Some(Duration::from_millis(5)))
            .unwrap();
        assert_eq!(
            reader.config().read_timeout,
            Some(Duration::from_millis(5))
        );
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_stream_pair() {
        let (left, right) = MdStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let mut builder = Datagram::create(&[10, 11], 12, 13).unwrap();
        builder.append_u32(99);
        let sent = builder.build();

        writer.write_frame(&sent).unwrap();
        writer.write_frame(&Datagram::create_add_channel(10)).unwrap();

        assert_eq!(reader.read_frame().unwrap(), sent);
        assert_eq!(
            reader.read_frame().unwrap(),
            Datagram::create_add_channel(10)
        );
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = FrameReader::new(cursor);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    enum Step {
        Data(Vec<u8>),
        Err(ErrorKind),
    }

    /// Replays a fixed script of reads, then reports EOF.
    struct ScriptedReader {
        steps: Vec<Step>,
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.steps.is_empty() {
                return Ok(0);
            }
            match self.steps.remove(0) {
                Step::Err(kind) => Err(std::io::Error::from(kind)),
                Step::Data(mut data) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        self.steps.insert(0, Step::Data(data.split_off(n)));
                    }
                    Ok(n)
                }
            }
        }
    }
}
