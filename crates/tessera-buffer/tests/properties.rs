//! Property tests for the byte buffers.

use proptest::prelude::*;
use tessera_buffer::{ByteSink, FrameReader, FrameWriter, HEADER_SIZE};

fn chunks() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..32)
}

proptest! {
    /// However the sink grows, its contents are the concatenation of every
    /// write, in order.
    #[test]
    fn test_growth_preserves_data(capacity in 0usize..8, writes in chunks()) {
        let mut sink = ByteSink::with_capacity(capacity);
        let mut expected = Vec::new();
        for chunk in &writes {
            sink.put_slice(chunk);
            expected.extend_from_slice(chunk);
        }
        prop_assert_eq!(sink.flip(), expected.as_slice());
        prop_assert!(sink.capacity() >= expected.len());
    }

    /// The header always equals payload length plus header size, even after
    /// the writer has been reused.
    #[test]
    fn test_frame_length_is_exact(first in chunks(), second in chunks()) {
        let mut writer = FrameWriter::with_capacity(1);
        for chunk in &first {
            writer.payload_mut().put_slice(chunk);
        }
        writer.finalize_frame().unwrap();
        writer.reset_frame();

        let mut payload = Vec::new();
        for chunk in &second {
            writer.payload_mut().put_slice(chunk);
            payload.extend_from_slice(chunk);
        }
        let bytes = writer.finalize_frame().unwrap();

        let declared = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        prop_assert_eq!(declared, payload.len() + HEADER_SIZE);
        prop_assert_eq!(&bytes[HEADER_SIZE..], payload.as_slice());
    }

    /// mark, read k bytes, reset, read k bytes: the same k bytes twice.
    #[test]
    fn test_mark_reset_is_idempotent(
        data in prop::collection::vec(any::<u8>(), 0..128),
        skip in 0usize..64,
        k in 0usize..64,
    ) {
        let mut sink = ByteSink::new();
        sink.put_slice(&data);
        let mut source = sink.reader();
        source.skip(skip);

        source.mark();
        let mut first = vec![0u8; k];
        let n1 = source.read_into(&mut first, 0, k).unwrap();
        source.reset_to_mark().unwrap();
        let mut second = vec![0u8; k];
        let n2 = source.read_into(&mut second, 0, k).unwrap();

        prop_assert_eq!(n1, n2);
        prop_assert_eq!(first, second);
    }

    /// Frames survive being split at arbitrary chunk boundaries.
    #[test]
    fn test_frames_reassemble_across_chunks(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 1..8),
        split in 1usize..16,
    ) {
        let mut stream = Vec::new();
        let mut writer = FrameWriter::new();
        for payload in &payloads {
            writer.reset_frame();
            writer.payload_mut().put_slice(payload);
            stream.extend_from_slice(writer.finalize_frame().unwrap());
        }

        let mut reader = FrameReader::new();
        let mut received = Vec::new();
        for chunk in stream.chunks(split) {
            reader.push(chunk);
            while let Some(frame) = reader.next_frame().unwrap() {
                received.push(frame.as_slice().to_vec());
            }
        }
        prop_assert_eq!(received, payloads);
    }
}
