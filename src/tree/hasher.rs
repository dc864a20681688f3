//! Structural fingerprints for project subtrees using BLAKE3

use crate::tree::Node;
use crate::types::AttributeValue;
use blake3::Hasher;

/// Digest of a subtree.
pub type Digest = [u8; 32];

/// Compute the digest of `node` and everything below it.
///
/// digest = hash("node" || id || type_len || type || name_len || name ||
///               attr_count || attrs || child_count || child digests)
///
/// Attributes are hashed in key order and children in tree order, so two
/// subtrees share a digest exactly when they serialize identically.
pub fn subtree_digest(node: &Node) -> Digest {
    let mut hasher = Hasher::new();

    hasher.update(b"node");
    hasher.update(node.id().as_uuid().as_bytes());
    update_str(&mut hasher, node.type_id());
    update_str(&mut hasher, node.name());

    hasher.update(&(node.attributes().len() as u64).to_be_bytes());
    for (key, value) in node.attributes() {
        update_str(&mut hasher, key);
        update_value(&mut hasher, value);
    }

    hasher.update(&(node.children().len() as u64).to_be_bytes());
    for child in node.children() {
        hasher.update(&subtree_digest(child));
    }

    *hasher.finalize().as_bytes()
}

/// Hex-encoded subtree digest.
pub fn fingerprint(node: &Node) -> String {
    hex::encode(subtree_digest(node))
}

fn update_str(hasher: &mut Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_be_bytes());
    hasher.update(s.as_bytes());
}

fn update_value(hasher: &mut Hasher, value: &AttributeValue) {
    match value {
        AttributeValue::Bool(v) => {
            hasher.update(b"b");
            hasher.update(&[*v as u8]);
        }
        AttributeValue::Int(v) => {
            hasher.update(b"i");
            hasher.update(&v.to_be_bytes());
        }
        AttributeValue::Float(v) => {
            hasher.update(b"f");
            hasher.update(&v.to_bits().to_be_bytes());
        }
        AttributeValue::Text(v) => {
            hasher.update(b"s");
            update_str(hasher, v);
        }
    }
}
