//! Just enough DER for SubjectPublicKeyInfo and PKCS#8.

use zeroize::Zeroizing;

use super::keys::{KeyMaterial, sizes};
use crate::keys::{KeyFamily, KeyType};

const INTEGER: u8 = 0x02;
const BIT_STRING: u8 = 0x03;
const OCTET_STRING: u8 = 0x04;
const OID: u8 = 0x06;
const SEQUENCE: u8 = 0x30;
/// `[0] IMPLICIT OCTET STRING`, the seed-only private key form.
const SEED: u8 = 0x80;

fn push_len(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 6);
    out.push(tag);
    push_len(&mut out, content.len());
    out.extend_from_slice(content);
    out
}

/// Encodes a dotted object identifier's content octets.
fn oid(dotted: &str) -> Option<Vec<u8>> {
    let arcs = dotted
        .split('.')
        .map(|s| s.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    let (&first, rest) = arcs.split_first()?;
    let (&second, rest) = rest.split_first()?;
    let mut out = Vec::new();
    let mut push_arc = |mut v: u64| {
        let mut tmp = vec![(v & 0x7f) as u8];
        v >>= 7;
        while v > 0 {
            tmp.push(0x80 | (v & 0x7f) as u8);
            v >>= 7;
        }
        out.extend(tmp.iter().rev());
    };
    push_arc(first.checked_mul(40)?.checked_add(second)?);
    for &arc in rest {
        push_arc(arc);
    }
    Some(out)
}

fn algorithm(key_type: KeyType) -> Option<Vec<u8>> {
    Some(tlv(SEQUENCE, &tlv(OID, &oid(key_type.oid())?)))
}

pub(super) fn encode_public(key: &KeyMaterial) -> Option<Vec<u8>> {
    let mut body = algorithm(key.key_type)?;
    let mut bits = vec![0u8];
    bits.extend_from_slice(&key.public);
    body.extend(tlv(BIT_STRING, &bits));
    Some(tlv(SEQUENCE, &body))
}

/// Encodes the seed when the key holds one, otherwise the expanded
/// private key.
pub(super) fn encode_private(key: &KeyMaterial) -> Option<Zeroizing<Vec<u8>>> {
    let sk = key.private.as_ref()?;
    let inner = Zeroizing::new(match (key.key_type.family(), &key.seed) {
        (KeyFamily::SlhDsa, _) => sk.to_vec(),
        (_, Some(seed)) => tlv(SEED, seed),
        (_, None) => tlv(OCTET_STRING, sk),
    });
    let mut body = tlv(INTEGER, &[0]);
    body.extend(algorithm(key.key_type)?);
    body.extend(tlv(OCTET_STRING, &inner));
    let out = Zeroizing::new(tlv(SEQUENCE, &body));
    Some(out)
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn peek(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Reads one element with tag `tag`, returning its content.
    fn read(&mut self, tag: u8) -> Option<&'a [u8]> {
        let (&t, rest) = self.data.split_first()?;
        if t != tag {
            return None;
        }
        let (&first, mut rest) = rest.split_first()?;
        let len = if first < 0x80 {
            usize::from(first)
        } else {
            let n = usize::from(first & 0x7f);
            if n == 0 || n > size_of::<usize>() || rest.len() < n {
                return None;
            }
            let (bytes, tail) = rest.split_at(n);
            rest = tail;
            bytes
                .iter()
                .fold(0usize, |acc, &b| (acc << 8) | usize::from(b))
        };
        if rest.len() < len {
            return None;
        }
        let (content, tail) = rest.split_at(len);
        self.data = tail;
        Some(content)
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn read_algorithm(r: &mut Reader<'_>) -> Option<KeyType> {
    let mut alg = Reader::new(r.read(SEQUENCE)?);
    let id = alg.read(OID)?;
    KeyType::ALL
        .iter()
        .copied()
        .find(|kt| oid(kt.oid()).as_deref() == Some(id))
}

pub(super) fn decode_public(der: &[u8]) -> Option<KeyMaterial> {
    let mut outer = Reader::new(der);
    let mut spki = Reader::new(outer.read(SEQUENCE)?);
    if !outer.is_empty() {
        return None;
    }
    let key_type = read_algorithm(&mut spki)?;
    let bits = spki.read(BIT_STRING)?;
    let (&unused, pk) = bits.split_first()?;
    if unused != 0 || pk.len() != sizes(key_type).public || !spki.is_empty() {
        return None;
    }
    Some(KeyMaterial::from_public(key_type, pk))
}

pub(super) fn decode_private(der: &[u8]) -> Option<KeyMaterial> {
    let mut outer = Reader::new(der);
    let mut info = Reader::new(outer.read(SEQUENCE)?);
    if !outer.is_empty() {
        return None;
    }
    if info.read(INTEGER)? != [0] {
        return None;
    }
    let key_type = read_algorithm(&mut info)?;
    let inner = info.read(OCTET_STRING)?;
    let sk_len = sizes(key_type).private;

    if key_type.family() == KeyFamily::SlhDsa {
        return (inner.len() == sk_len).then(|| KeyMaterial::from_private(key_type, inner.to_vec()));
    }
    let mut r = Reader::new(inner);
    let key = match r.peek()? {
        SEED => {
            let seed = r.read(SEED)?;
            (seed.len() == key_type.seed_len()).then(|| KeyMaterial::from_seed(key_type, seed))?
        }
        OCTET_STRING => {
            let sk = r.read(OCTET_STRING)?;
            (sk.len() == sk_len).then(|| KeyMaterial::from_private(key_type, sk.to_vec()))?
        }
        SEQUENCE => {
            // Both forms: the seed wins, and must agree with the
            // expanded key.
            let mut both = Reader::new(r.read(SEQUENCE)?);
            let seed = both.read(OCTET_STRING)?;
            let sk = both.read(OCTET_STRING)?;
            if seed.len() != key_type.seed_len() || !both.is_empty() {
                return None;
            }
            let key = KeyMaterial::from_seed(key_type, seed);
            (key.private.as_deref().map(Vec::as_slice) == Some(sk)).then_some(key)?
        }
        _ => return None,
    };
    r.is_empty().then_some(key)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_oid_encoding() {
        // id-ml-dsa-44
        assert_eq!(
            oid("2.16.840.1.101.3.4.3.17").unwrap(),
            [0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x03, 0x11]
        );
        assert_eq!(oid("1.2.x"), None);
    }

    #[test]
    fn test_long_lengths() {
        let content = vec![0u8; 1312];
        let enc = tlv(BIT_STRING, &content);
        assert_eq!(&enc[..4], &[BIT_STRING, 0x82, 0x05, 0x20]);
        let mut r = Reader::new(&enc);
        assert_eq!(r.read(BIT_STRING).map(<[u8]>::len), Some(1312));
        assert!(r.is_empty());
    }

    #[test]
    fn test_spki_prefix() {
        let key = KeyMaterial::generate(KeyType::MlDsa44);
        let der = encode_public(&key).unwrap();
        // The fixed ML-DSA-44 prefix.
        assert_eq!(
            &der[..22],
            &[
                0x30, 0x82, 0x05, 0x32, 0x30, 0x0b, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03,
                0x04, 0x03, 0x11, 0x03, 0x82, 0x05, 0x21, 0x00
            ]
        );
        let back = decode_public(&der).unwrap();
        assert_eq!(back.public, key.public);
    }

    #[test]
    fn test_truncated_rejected() {
        let key = KeyMaterial::generate(KeyType::MlKem512);
        let der = encode_private(&key).unwrap();
        assert!(decode_private(&der).is_some());
        assert!(decode_private(&der[..der.len() - 1]).is_none());
    }
}
