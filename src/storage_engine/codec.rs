use crate::error::{Error, Result};
use crate::storage_engine::{Node, TreeConfig};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// On-disk sentinel for an empty slot: the original signed -1 reinterpreted as unsigned.
/// In memory empty slots are `None`, so the sentinel never collides with a real key; as a
/// consequence `u64::MAX` is not a legal key or address.
pub const NIL: u64 = u64::MAX;

/// Encodes a node into exactly one block. Field order is fixed and positional: address,
/// parent, child addresses, keys, then frequencies, all big-endian, zero-padded to the
/// block size so a node's file offset can serve as its identity.
pub fn encode(node: &Node, config: &TreeConfig) -> Bytes {
    let mut buf = BytesMut::with_capacity(config.block_size);
    buf.put_u64(node.address);
    buf.put_u64(node.parent.unwrap_or(NIL));
    for child in &node.children {
        buf.put_u64(child.unwrap_or(NIL));
    }
    for key in &node.keys {
        buf.put_u64(key.unwrap_or(NIL));
    }
    for frequency in &node.frequencies {
        buf.put_u32(*frequency);
    }
    buf.resize(config.block_size, 0);
    buf.freeze()
}

/// Decodes one block into a node. A buffer too short for the fixed encoding signals
/// on-disk corruption and is a fatal decode error; no field is ever defaulted.
pub fn decode(mut buf: &[u8], config: &TreeConfig) -> Result<Node> {
    if buf.len() < config.encoded_size() {
        return Err(Error::Decode(format!(
            "Block of {} bytes is shorter than the {}-byte node encoding",
            buf.len(),
            config.encoded_size()
        )));
    }
    let address = buf.get_u64();
    let parent = slot(buf.get_u64());
    let mut children = Vec::with_capacity(config.num_children());
    for _ in 0..config.num_children() {
        children.push(slot(buf.get_u64()));
    }
    let mut keys = Vec::with_capacity(config.order);
    for _ in 0..config.order {
        keys.push(slot(buf.get_u64()));
    }
    let mut frequencies = Vec::with_capacity(config.order);
    for _ in 0..config.order {
        frequencies.push(buf.get_u32());
    }
    Ok(Node { address, parent, children, keys, frequencies })
}

fn slot(value: u64) -> Option<u64> {
    if value == NIL {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod codec_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> TreeConfig {
        TreeConfig::default()
    }

    #[test]
    fn round_trip() {
        let config = config();
        let mut node = Node::new(&config, 8192);
        node.parent = Some(0);
        node.children = vec![Some(4096), Some(12288), None, None, None];
        node.keys = vec![Some(23), Some(55), None, None];
        node.frequencies = vec![3, 1, 0, 0];
        assert_eq!(decode(&encode(&node, &config), &config), Ok(node));
    }

    #[test]
    fn round_trip_empty_root() {
        let config = config();
        let node = Node::new(&config, 0);
        assert_eq!(decode(&encode(&node, &config), &config), Ok(node));
    }

    #[test]
    fn encoded_size_is_one_block() {
        let config = config();
        let mut node = Node::new(&config, 0);
        assert_eq!(encode(&node, &config).len(), config.block_size);
        node.insert_slot(42, 9).unwrap();
        assert_eq!(encode(&node, &config).len(), config.block_size);
    }

    #[test]
    fn field_layout_is_big_endian_and_positional() {
        let config = config();
        let mut node = Node::new(&config, 4096);
        node.parent = Some(0);
        node.keys[0] = Some(0x0102030405060708);
        node.frequencies[0] = 0x0A0B0C0D;
        let bytes = encode(&node, &config);

        assert_eq!(&bytes[0..8], 4096u64.to_be_bytes());
        assert_eq!(&bytes[8..16], 0u64.to_be_bytes());
        // Five empty child slots carry the sentinel.
        for i in 0..config.num_children() {
            assert_eq!(&bytes[16 + 8 * i..24 + 8 * i], u64::MAX.to_be_bytes());
        }
        // Keys follow the children, frequencies follow the keys.
        assert_eq!(&bytes[56..64], 0x0102030405060708u64.to_be_bytes());
        assert_eq!(&bytes[88..92], 0x0A0B0C0Du32.to_be_bytes());
        // The remainder of the block is zero padding.
        assert!(bytes[config.encoded_size()..].iter().all(|b| *b == 0));
    }

    #[test]
    fn truncated_block_is_fatal() {
        let config = config();
        let bytes = encode(&Node::new(&config, 0), &config);
        let result = decode(&bytes[..config.encoded_size() - 1], &config);
        assert!(matches!(result, Err(Error::Decode(_))));
        assert!(matches!(decode(&[], &config), Err(Error::Decode(_))));
    }

    #[test]
    fn decode_reads_exact_inverse_of_another_order() {
        let config = TreeConfig::with_order(6);
        let mut node = Node::new(&config, 12288);
        for key in [5u64, 9, 12, 40] {
            node.insert_slot(key, key as u32).unwrap();
        }
        assert_eq!(decode(&encode(&node, &config), &config), Ok(node));
    }
}
