//! ANS-104 data items with Ed25519 signatures.
//!
//! Every state-changing message is submitted to the messenger unit as a
//! signed data item. Layout (all integers little-endian):
//!
//! ```text
//! u16      signature type (2 = Ed25519)
//! [u8;64]  signature
//! [u8;32]  owner (public key)
//! u8 (+32) target present flag, then target
//! u8 (+32) anchor present flag, then anchor
//! u64      tag count
//! u64      tag bytes length
//! ...      Avro-encoded tags
//! ...      data
//! ```
//!
//! The signature covers a SHA-384 "deep hash" of the item's fields.

use anyhow::{bail, ensure, Context};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::{Buf, BufMut, BytesMut};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256, Sha384};

use crate::net::Tag;
use crate::wallet::Wallet;

pub const SIG_TYPE_ED25519: u16 = 2;
pub const SIG_LEN: usize = 64;
pub const OWNER_LEN: usize = 32;

/// Fresh random anchor; makes otherwise identical submissions distinct.
pub fn random_anchor() -> [u8; 32] {
    rand::random()
}

/// Decodes a base64url transaction/process id into its 32 raw bytes.
pub fn decode_id(id: &str) -> anyhow::Result<[u8; 32]> {
    let raw = URL_SAFE_NO_PAD
        .decode(id)
        .with_context(|| format!("decode id {id}"))?;
    raw.as_slice()
        .try_into()
        .with_context(|| format!("id {id} is {} bytes, expected 32", raw.len()))
}

// ─── Avro tag encoding ───

fn write_long(buf: &mut BytesMut, n: i64) {
    let mut z = ((n << 1) ^ (n >> 63)) as u64;
    while z & !0x7f != 0 {
        buf.put_u8(((z & 0x7f) | 0x80) as u8);
        z >>= 7;
    }
    buf.put_u8(z as u8);
}

fn read_long(buf: &mut &[u8]) -> anyhow::Result<i64> {
    let mut z: u64 = 0;
    let mut shift = 0;
    loop {
        ensure!(buf.has_remaining(), "truncated varint");
        ensure!(shift < 64, "varint too long");
        let b = buf.get_u8();
        z |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Ok(((z >> 1) as i64) ^ -((z & 1) as i64))
}

fn write_bytes(buf: &mut BytesMut, b: &[u8]) {
    write_long(buf, b.len() as i64);
    buf.put_slice(b);
}

fn read_string(buf: &mut &[u8]) -> anyhow::Result<String> {
    let len = read_long(buf)?;
    ensure!(len >= 0 && len as usize <= buf.remaining(), "bad tag length {len}");
    let raw = buf.copy_to_bytes(len as usize);
    String::from_utf8(raw.to_vec()).context("tag is not utf-8")
}

/// Encodes tags as an Avro array of `{name: bytes, value: bytes}` records.
/// No tags encode to zero bytes.
pub fn encode_tags(tags: &[Tag]) -> Vec<u8> {
    if tags.is_empty() {
        return Vec::new();
    }
    let mut buf = BytesMut::new();
    write_long(&mut buf, tags.len() as i64);
    for tag in tags {
        write_bytes(&mut buf, tag.name.as_bytes());
        write_bytes(&mut buf, tag.value.as_bytes());
    }
    write_long(&mut buf, 0);
    buf.to_vec()
}

pub fn decode_tags(mut raw: &[u8]) -> anyhow::Result<Vec<Tag>> {
    let mut tags = Vec::new();
    if raw.is_empty() {
        return Ok(tags);
    }
    loop {
        let mut count = read_long(&mut raw)?;
        if count == 0 {
            break;
        }
        if count < 0 {
            // Negative block counts are followed by the block's byte size.
            count = -count;
            read_long(&mut raw)?;
        }
        for _ in 0..count {
            let name = read_string(&mut raw)?;
            let value = read_string(&mut raw)?;
            tags.push(Tag { name, value });
        }
    }
    Ok(tags)
}

// ─── Deep hash ───

/// Input to [`deep_hash`].
pub enum DeepHashChunk<'a> {
    Blob(&'a [u8]),
    List(Vec<DeepHashChunk<'a>>),
}

fn sha384(parts: &[&[u8]]) -> [u8; 48] {
    let mut h = Sha384::new();
    for p in parts {
        h.update(p);
    }
    h.finalize().into()
}

pub fn deep_hash(chunk: &DeepHashChunk<'_>) -> [u8; 48] {
    match chunk {
        DeepHashChunk::Blob(data) => {
            let tag = format!("blob{}", data.len());
            let tag_hash = sha384(&[tag.as_bytes()]);
            let data_hash = sha384(&[*data]);
            sha384(&[&tag_hash[..], &data_hash[..]])
        }
        DeepHashChunk::List(items) => {
            let tag = format!("list{}", items.len());
            let mut acc = sha384(&[tag.as_bytes()]);
            for item in items {
                let h = deep_hash(item);
                acc = sha384(&[&acc[..], &h[..]]);
            }
            acc
        }
    }
}

// ─── Data item ───

/// A data item, signed or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    pub signature: Option<[u8; SIG_LEN]>,
    pub owner: [u8; OWNER_LEN],
    pub target: Option<[u8; 32]>,
    pub anchor: Option<[u8; 32]>,
    pub tags: Vec<Tag>,
    pub data: Vec<u8>,
}

impl DataItem {
    /// Unsigned item owned by `wallet`.
    pub fn new(
        wallet: &Wallet,
        target: Option<[u8; 32]>,
        anchor: Option<[u8; 32]>,
        tags: Vec<Tag>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            signature: None,
            owner: wallet.owner(),
            target,
            anchor,
            tags,
            data,
        }
    }

    /// The message the signature covers.
    pub fn signing_message(&self) -> [u8; 48] {
        let sig_type = SIG_TYPE_ED25519.to_string();
        let tags = encode_tags(&self.tags);
        let target = self.target.map(|t| t.to_vec()).unwrap_or_default();
        let anchor = self.anchor.map(|a| a.to_vec()).unwrap_or_default();
        deep_hash(&DeepHashChunk::List(vec![
            DeepHashChunk::Blob(b"dataitem"),
            DeepHashChunk::Blob(b"1"),
            DeepHashChunk::Blob(sig_type.as_bytes()),
            DeepHashChunk::Blob(&self.owner),
            DeepHashChunk::Blob(&target),
            DeepHashChunk::Blob(&anchor),
            DeepHashChunk::Blob(&tags),
            DeepHashChunk::Blob(&self.data),
        ]))
    }

    pub fn sign(&mut self, wallet: &Wallet) -> anyhow::Result<()> {
        ensure!(
            wallet.owner() == self.owner,
            "wallet does not own this data item"
        );
        let msg = self.signing_message();
        self.signature = Some(wallet.sign(&msg));
        Ok(())
    }

    /// base64url(SHA-256(signature)).
    pub fn id(&self) -> anyhow::Result<String> {
        let sig = self.signature.context("data item is not signed")?;
        Ok(URL_SAFE_NO_PAD.encode(Sha256::digest(sig)))
    }

    pub fn verify(&self) -> anyhow::Result<()> {
        let sig = self.signature.context("data item is not signed")?;
        let key = VerifyingKey::from_bytes(&self.owner).context("owner is not an ed25519 key")?;
        key.verify(&self.signing_message(), &Signature::from_bytes(&sig))
            .context("signature mismatch")
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let sig = self.signature.context("data item is not signed")?;
        let tags = encode_tags(&self.tags);
        let mut buf = BytesMut::with_capacity(
            2 + SIG_LEN + OWNER_LEN + 66 + 16 + tags.len() + self.data.len(),
        );
        buf.put_u16_le(SIG_TYPE_ED25519);
        buf.put_slice(&sig);
        buf.put_slice(&self.owner);
        for field in [self.target, self.anchor] {
            match field {
                Some(bytes) => {
                    buf.put_u8(1);
                    buf.put_slice(&bytes);
                }
                None => buf.put_u8(0),
            }
        }
        buf.put_u64_le(self.tags.len() as u64);
        buf.put_u64_le(tags.len() as u64);
        buf.put_slice(&tags);
        buf.put_slice(&self.data);
        Ok(buf.to_vec())
    }

    pub fn from_bytes(mut raw: &[u8]) -> anyhow::Result<Self> {
        ensure!(raw.remaining() >= 2 + SIG_LEN + OWNER_LEN + 2, "data item too short");
        let sig_type = raw.get_u16_le();
        if sig_type != SIG_TYPE_ED25519 {
            bail!("unsupported signature type {sig_type}");
        }
        let mut signature = [0u8; SIG_LEN];
        raw.copy_to_slice(&mut signature);
        let mut owner = [0u8; OWNER_LEN];
        raw.copy_to_slice(&mut owner);

        let mut optional = || -> anyhow::Result<Option<[u8; 32]>> {
            ensure!(raw.has_remaining(), "truncated presence flag");
            match raw.get_u8() {
                0 => Ok(None),
                1 => {
                    ensure!(raw.remaining() >= 32, "truncated field");
                    let mut out = [0u8; 32];
                    raw.copy_to_slice(&mut out);
                    Ok(Some(out))
                }
                flag => bail!("bad presence flag {flag}"),
            }
        };
        let target = optional()?;
        let anchor = optional()?;

        ensure!(raw.remaining() >= 16, "truncated tag header");
        let tag_count = raw.get_u64_le();
        let tag_len = raw.get_u64_le() as usize;
        ensure!(raw.remaining() >= tag_len, "truncated tags");
        let tags = decode_tags(&raw[..tag_len])?;
        ensure!(
            tags.len() as u64 == tag_count,
            "tag count {tag_count} does not match {} decoded tags",
            tags.len()
        );
        raw.advance(tag_len);

        Ok(Self {
            signature: Some(signature),
            owner,
            target,
            anchor,
            tags,
            data: raw.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(wallet: &Wallet) -> DataItem {
        DataItem::new(
            wallet,
            Some([7u8; 32]),
            None,
            vec![Tag::new("Action", "JoinRoom"), Tag::new("gameID", "3")],
            Vec::new(),
        )
    }

    #[test]
    fn avro_tags_decode() {
        let tags = vec![Tag::new("Action", "GetMyCards"), Tag::new("gameID", "")];
        let raw = encode_tags(&tags);
        // count=2 zig-zags to 4
        assert_eq!(raw[0], 4);
        assert_eq!(*raw.last().unwrap(), 0);
        assert_eq!(decode_tags(&raw).unwrap(), tags);
        assert!(encode_tags(&[]).is_empty());
    }

    #[test]
    fn zigzag_long_values() {
        let mut buf = BytesMut::new();
        write_long(&mut buf, 64);
        assert_eq!(&buf[..], &[0x80u8, 0x01][..]);
        let mut slice: &[u8] = &buf;
        assert_eq!(read_long(&mut slice).unwrap(), 64);
    }

    #[test]
    fn deep_hash_distinguishes_structure() {
        let flat = deep_hash(&DeepHashChunk::List(vec![
            DeepHashChunk::Blob(b"a"),
            DeepHashChunk::Blob(b"b"),
        ]));
        let nested = deep_hash(&DeepHashChunk::List(vec![DeepHashChunk::List(vec![
            DeepHashChunk::Blob(b"a"),
            DeepHashChunk::Blob(b"b"),
        ])]));
        let joined = deep_hash(&DeepHashChunk::Blob(b"ab"));
        assert_ne!(flat, nested);
        assert_ne!(flat, joined);
    }

    #[test]
    fn signed_item_verifies_and_reparses() {
        let wallet = Wallet::generate();
        let mut item = sample(&wallet);
        assert!(item.to_bytes().is_err());
        item.sign(&wallet).unwrap();
        item.verify().unwrap();

        let raw = item.to_bytes().unwrap();
        let back = DataItem::from_bytes(&raw).unwrap();
        assert_eq!(back, item);
        assert_eq!(back.id().unwrap(), item.id().unwrap());
        assert_eq!(item.id().unwrap().len(), 43);
    }

    #[test]
    fn tampering_breaks_signature() {
        let wallet = Wallet::generate();
        let mut item = sample(&wallet);
        item.sign(&wallet).unwrap();
        item.tags[1].value = "4".into();
        assert!(item.verify().is_err());
    }

    #[test]
    fn foreign_wallet_cannot_sign() {
        let owner = Wallet::generate();
        let other = Wallet::generate();
        let mut item = sample(&owner);
        assert!(item.sign(&other).is_err());
    }

    #[test]
    fn process_id_decodes_to_32_bytes() {
        let id = decode_id(crate::config::DEFAULT_PROCESS_ID).unwrap();
        assert_eq!(URL_SAFE_NO_PAD.encode(id), crate::config::DEFAULT_PROCESS_ID);
        assert!(decode_id("short").is_err());
    }
}
