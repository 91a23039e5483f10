//! Stand-in ML-DSA and SLH-DSA signing.

use std::sync::Arc;

use sha2::{Digest, Sha512};
use zeroize::Zeroizing;

use super::keys::{KeyMaterial, expand, random, sizes};
use crate::{fault::FaultCode, keys::KeyFamily, ni::SignerParams};

/// The length of an ML-DSA message representative.
pub(super) const MU_LEN: usize = 64;
const MAX_CONTEXT_LEN: usize = 255;

const MU_INTERNAL: i32 = 0;
const MU_EXTERNAL: i32 = 1;
const MU_CALCULATE_ONLY: i32 = 2;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(super) enum Op {
    Sign,
    Verify,
}

struct Bound {
    op: Op,
    key: Arc<KeyMaterial>,
    context: Vec<u8>,
    params: SignerParams,
    msg: Zeroizing<Vec<u8>>,
}

/// A signer as created by `signer_allocate`.
pub(super) struct SignerCtx {
    family: KeyFamily,
    bound: Option<Bound>,
}

impl SignerCtx {
    pub(super) fn new(family: KeyFamily) -> Self {
        Self {
            family,
            bound: None,
        }
    }

    pub(super) fn family(&self) -> KeyFamily {
        self.family
    }

    pub(super) fn init(
        &mut self,
        op: Op,
        key: Arc<KeyMaterial>,
        context: &[u8],
        params: SignerParams,
    ) -> Result<(), FaultCode> {
        if context.len() > MAX_CONTEXT_LEN {
            return Err(FaultCode::ContextBytesTooLong);
        }
        if params.family() != self.family {
            return Err(FaultCode::UnexpectedState);
        }
        match params {
            SignerParams::MlDsa { mu_mode } => {
                if !(MU_INTERNAL..=MU_CALCULATE_ONLY).contains(&mu_mode) {
                    return Err(FaultCode::UnknownMuMode);
                }
                if op == Op::Verify && mu_mode == MU_CALCULATE_ONLY {
                    return Err(FaultCode::InvalidMuModeForVerify);
                }
            }
            SignerParams::SlhDsa {
                message_encoding,
                deterministic,
            } => {
                if !(0..=1).contains(&message_encoding) {
                    return Err(FaultCode::InvalidSlhDsaMsgEncodingParam);
                }
                if !(0..=1).contains(&deterministic) {
                    return Err(FaultCode::InvalidSlhDsaDeterministicParam);
                }
            }
        }
        if key.key_type.family() != self.family {
            return Err(FaultCode::IncorrectKeyType);
        }
        if op == Op::Sign && key.private.is_none() {
            return Err(FaultCode::KeySpecHasNullKey);
        }
        self.bound = Some(Bound {
            op,
            key,
            context: context.to_vec(),
            params,
            msg: Zeroizing::new(Vec::new()),
        });
        Ok(())
    }

    pub(super) fn update(&mut self, data: &[u8]) -> Result<(), FaultCode> {
        let b = self.bound.as_mut().ok_or(FaultCode::NotInitialized)?;
        b.msg.extend_from_slice(data);
        Ok(())
    }

    fn expect(&self, op: Op) -> Result<&Bound, FaultCode> {
        let b = self.bound.as_ref().ok_or(FaultCode::NotInitialized)?;
        if b.op != op {
            return Err(FaultCode::UnexpectedState);
        }
        Ok(b)
    }

    /// The length [`sign`](Self::sign) will produce.
    pub(super) fn sign_len(&self) -> Result<usize, FaultCode> {
        let b = self.expect(Op::Sign)?;
        Ok(match b.params {
            SignerParams::MlDsa {
                mu_mode: MU_CALCULATE_ONLY,
            } => MU_LEN,
            _ => sizes(b.key.key_type).output,
        })
    }

    pub(super) fn sign(&self) -> Result<Vec<u8>, FaultCode> {
        let b = self.expect(Op::Sign)?;
        match b.params {
            SignerParams::MlDsa { mu_mode } => {
                let mu = b.mu(mu_mode)?;
                if mu_mode == MU_CALCULATE_ONLY {
                    return Ok(mu.to_vec());
                }
                Ok(ml_dsa_sig(&b.key, &mu))
            }
            SignerParams::SlhDsa {
                message_encoding,
                deterministic,
            } => {
                let n = sizes(b.key.key_type).public / 2;
                let m = b.slh_message(message_encoding);
                let r = if deterministic == 1 {
                    let sk = b.key.private.as_deref().ok_or(FaultCode::KeySpecHasNullKey)?;
                    expand("SLH-DSA R", &[sk, &m], n)
                } else {
                    random(n)
                };
                Ok(slh_dsa_sig(&b.key, &r, &m))
            }
        }
    }

    /// Reports whether `sig` is valid.
    pub(super) fn verify(&self, sig: &[u8]) -> Result<bool, FaultCode> {
        let b = self.expect(Op::Verify)?;
        if sig.len() != sizes(b.key.key_type).output {
            return Ok(false);
        }
        let expected = match b.params {
            SignerParams::MlDsa { mu_mode } => ml_dsa_sig(&b.key, &b.mu(mu_mode)?),
            SignerParams::SlhDsa {
                message_encoding, ..
            } => {
                let n = sizes(b.key.key_type).public / 2;
                slh_dsa_sig(&b.key, &sig[..n], &b.slh_message(message_encoding))
            }
        };
        Ok(ct_eq(&expected, sig))
    }
}

impl Bound {
    fn mu(&self, mu_mode: i32) -> Result<[u8; MU_LEN], FaultCode> {
        let mut mu = [0u8; MU_LEN];
        if mu_mode == MU_EXTERNAL {
            if self.msg.len() != MU_LEN {
                return Err(FaultCode::ExternalMuInvalidLen);
            }
            mu.copy_from_slice(&self.msg);
            return Ok(mu);
        }
        let tr = Sha512::digest(&self.key.public);
        let digest = Sha512::new()
            .chain_update(tr)
            .chain_update([0, self.context.len() as u8])
            .chain_update(&self.context)
            .chain_update(&*self.msg)
            .finalize();
        mu.copy_from_slice(&digest);
        Ok(mu)
    }

    /// The message as SLH-DSA signs it.
    fn slh_message(&self, message_encoding: i32) -> Vec<u8> {
        if message_encoding == 0 {
            return self.msg.to_vec();
        }
        let mut m = vec![0, self.context.len() as u8];
        m.extend_from_slice(&self.context);
        m.extend_from_slice(&self.msg);
        m
    }
}

fn ml_dsa_sig(key: &KeyMaterial, mu: &[u8]) -> Vec<u8> {
    expand("ML-DSA sig", &[&key.public, mu], sizes(key.key_type).output)
}

fn slh_dsa_sig(key: &KeyMaterial, r: &[u8], m: &[u8]) -> Vec<u8> {
    let len = sizes(key.key_type).output;
    let mut sig = r.to_vec();
    sig.extend(expand("SLH-DSA sig", &[&key.public, r, m], len - r.len()));
    sig
}

fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::keys::KeyType;

    fn bound(kt: KeyType, op: Op, params: SignerParams) -> SignerCtx {
        let key = Arc::new(KeyMaterial::from_seed(kt, &vec![3u8; kt.seed_len()]));
        let mut ctx = SignerCtx::new(kt.family());
        ctx.init(op, key, b"ctx", params).unwrap();
        ctx
    }

    #[test]
    fn test_external_mu_matches_internal() {
        let kt = KeyType::MlDsa65;
        let mut calc = bound(kt, Op::Sign, SignerParams::MlDsa { mu_mode: 2 });
        calc.update(b"message").unwrap();
        let mu = calc.sign().unwrap();
        assert_eq!(mu.len(), MU_LEN);

        let mut ext = bound(kt, Op::Sign, SignerParams::MlDsa { mu_mode: 1 });
        ext.update(&mu).unwrap();
        let mut int = bound(kt, Op::Sign, SignerParams::MlDsa { mu_mode: 0 });
        int.update(b"message").unwrap();
        assert_eq!(ext.sign().unwrap(), int.sign().unwrap());
    }

    #[test]
    fn test_slh_deterministic() {
        let kt = KeyType::SlhDsaSha2_128f;
        let params = SignerParams::SlhDsa {
            message_encoding: 1,
            deterministic: 1,
        };
        let mut a = bound(kt, Op::Sign, params);
        a.update(b"m").unwrap();
        let sig = a.sign().unwrap();
        assert_eq!(sig, a.sign().unwrap());

        let mut v = bound(kt, Op::Verify, params);
        v.update(b"m").unwrap();
        assert!(v.verify(&sig).unwrap());
        v.update(b"!").unwrap();
        assert!(!v.verify(&sig).unwrap());
    }

    #[test]
    fn test_rejects() {
        let kt = KeyType::MlDsa44;
        let key = Arc::new(KeyMaterial::generate(kt));
        let mut ctx = SignerCtx::new(KeyFamily::MlDsa);
        let params = SignerParams::MlDsa { mu_mode: 2 };
        assert_eq!(
            ctx.init(Op::Verify, Arc::clone(&key), &[], params),
            Err(FaultCode::InvalidMuModeForVerify)
        );
        let params = SignerParams::MlDsa { mu_mode: 0 };
        assert_eq!(
            ctx.init(Op::Sign, Arc::clone(&key), &[0; 256], params),
            Err(FaultCode::ContextBytesTooLong)
        );
        assert_eq!(ctx.sign(), Err(FaultCode::NotInitialized));
        ctx.init(Op::Verify, key, &[], params).unwrap();
        assert_eq!(ctx.sign(), Err(FaultCode::UnexpectedState));
    }
}
