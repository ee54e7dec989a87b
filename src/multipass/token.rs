//! Claims codec: PS512 signed JWTs carrying a handle, its resource prefixes
//! and an expiry.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use rsa::pss::{BlindedSigningKey, Signature, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::sync::Arc;
use std::time::Duration;

use super::error::Error;
use super::keys::KeyPair;

pub const ALGORITHM: &str = "PS512";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Header {
    alg: String,
    typ: String,
}

impl Header {
    fn ps512() -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub handle: String,
    pub resources: Vec<String>,
    #[serde(rename = "exp")]
    pub expires: i64,
}

impl Claims {
    /// Claims expiring `ttl` after `now_unix_seconds`. Empty resources fall
    /// back to `["/"]`.
    #[must_use]
    pub fn new(
        handle: impl Into<String>,
        resources: &[String],
        ttl: Duration,
        now_unix_seconds: i64,
    ) -> Self {
        let resources = if resources.is_empty() {
            vec!["/".to_string()]
        } else {
            resources.to_vec()
        };
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            handle: handle.into(),
            resources,
            expires: now_unix_seconds.saturating_add(ttl),
        }
    }

    /// True when any resource prefix covers `path`.
    #[must_use]
    pub fn authorizes(&self, path: &str) -> bool {
        self.resources
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value).map_err(|e| Error::SigningFailure(e.to_string()))?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| Error::Malformed)
}

/// Sign `claims` into a compact JWT.
///
/// # Errors
/// Returns `Error::SigningFailure` if encoding or signing fails.
pub fn sign_ps512(private_key: &RsaPrivateKey, claims: &Claims) -> Result<String, Error> {
    let header_b64 = b64e_json(&Header::ps512())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let signing_key = BlindedSigningKey::<Sha512>::new(private_key.clone());
    let mut rng = rand::rngs::OsRng;
    let signature: Signature = signing_key
        .try_sign_with_rng(&mut rng, signing_input.as_bytes())
        .map_err(|e| Error::SigningFailure(e.to_string()))?;
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_vec());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify a compact JWT and return its claims.
///
/// The signature is checked before the expiry, so `Error::Expired` always
/// refers to an authentic token.
///
/// # Errors
/// - `Error::Malformed` for structural, encoding or algorithm problems,
/// - `Error::InvalidSignature` if the signature does not match `public_key`,
/// - `Error::Expired` if `exp` is not after `now_unix_seconds`.
pub fn verify_ps512(
    token: &str,
    public_key: &RsaPublicKey,
    now_unix_seconds: i64,
) -> Result<Claims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::Malformed)?;
    let claims_b64 = parts.next().ok_or(Error::Malformed)?;
    let sig_b64 = parts.next().ok_or(Error::Malformed)?;
    if parts.next().is_some() {
        return Err(Error::Malformed);
    }

    let header: Header = b64d_json(header_b64)?;
    if header.alg != ALGORITHM {
        return Err(Error::Malformed);
    }

    let signature_bytes = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Malformed)?;
    let signature =
        Signature::try_from(signature_bytes.as_slice()).map_err(|_| Error::InvalidSignature)?;
    let verifying_key = VerifyingKey::<Sha512>::new(public_key.clone());
    let signing_input = format!("{header_b64}.{claims_b64}");
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: Claims = b64d_json(claims_b64)?;
    if claims.expires <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(claims)
}

/// Issues and verifies tokens with the engine's key pair.
#[derive(Debug, Clone)]
pub struct ClaimsCodec {
    keys: Arc<KeyPair>,
}

impl ClaimsCodec {
    #[must_use]
    pub fn new(keys: Arc<KeyPair>) -> Self {
        Self { keys }
    }

    #[must_use]
    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    /// # Errors
    /// Returns `Error::SigningFailure` if signing fails.
    pub fn issue(&self, claims: &Claims) -> Result<String, Error> {
        sign_ps512(self.keys.private_key(), claims)
    }

    /// Verify against the engine's own public key at the current time.
    ///
    /// # Errors
    /// See [`verify_ps512`].
    pub fn verify(&self, token: &str) -> Result<Claims, Error> {
        verify_ps512(token, self.keys.public_key(), Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipass::testutil::{other_keys, signing_keys};

    const NOW: i64 = 1_700_000_000;

    fn claims(expires: i64) -> Claims {
        Claims {
            handle: "leeloo@dallas".to_string(),
            resources: vec!["/private".to_string()],
            expires,
        }
    }

    #[test]
    fn sign_and_verify_round_trip() -> Result<(), Error> {
        let keys = signing_keys();
        let original = claims(NOW + 60);
        let token = sign_ps512(keys.private_key(), &original)?;
        assert_eq!(token.split('.').count(), 3);

        let verified = verify_ps512(&token, keys.public_key(), NOW)?;
        assert_eq!(verified, original);
        Ok(())
    }

    #[test]
    fn header_names_ps512() -> Result<(), Error> {
        let keys = signing_keys();
        let token = sign_ps512(keys.private_key(), &claims(NOW + 60))?;
        let header_b64 = token.split('.').next().ok_or(Error::Malformed)?;
        let header: Header = b64d_json(header_b64)?;
        assert_eq!(header, Header::ps512());
        Ok(())
    }

    #[test]
    fn rejects_other_key() -> Result<(), Error> {
        let token = sign_ps512(signing_keys().private_key(), &claims(NOW + 60))?;
        let result = verify_ps512(&token, other_keys().public_key(), NOW);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn rejects_expired_with_valid_signature() -> Result<(), Error> {
        let keys = signing_keys();
        let token = sign_ps512(keys.private_key(), &claims(NOW))?;
        assert!(matches!(
            verify_ps512(&token, keys.public_key(), NOW),
            Err(Error::Expired)
        ));
        assert!(matches!(
            verify_ps512(&token, keys.public_key(), NOW + 3600),
            Err(Error::Expired)
        ));
        Ok(())
    }

    #[test]
    fn rejects_tampered_claims() -> Result<(), Error> {
        let keys = signing_keys();
        let token = sign_ps512(keys.private_key(), &claims(NOW + 60))?;
        let mut parts: Vec<&str> = token.split('.').collect();
        let mut forged = claims(NOW + 60);
        forged.resources = vec!["/".to_string()];
        let forged_b64 = b64e_json(&forged)?;
        parts[1] = &forged_b64;
        let forged_token = parts.join(".");

        assert!(matches!(
            verify_ps512(&forged_token, keys.public_key(), NOW),
            Err(Error::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn rejects_malformed_tokens() -> Result<(), Error> {
        let keys = signing_keys();
        let token = sign_ps512(keys.private_key(), &claims(NOW + 60))?;

        for bad in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert!(
                matches!(verify_ps512(bad, keys.public_key(), NOW), Err(Error::Malformed)),
                "expected malformed for {bad:?}"
            );
        }

        let extra = format!("{token}.extra");
        assert!(matches!(
            verify_ps512(&extra, keys.public_key(), NOW),
            Err(Error::Malformed)
        ));
        Ok(())
    }

    #[test]
    fn rejects_other_algorithms() -> Result<(), Error> {
        let keys = signing_keys();
        let token = sign_ps512(keys.private_key(), &claims(NOW + 60))?;
        let none_header = b64e_json(&Header {
            alg: "none".to_string(),
            typ: "JWT".to_string(),
        })?;
        let rest = token.split_once('.').map(|(_, rest)| rest).ok_or(Error::Malformed)?;
        let downgraded = format!("{none_header}.{rest}");

        assert!(matches!(
            verify_ps512(&downgraded, keys.public_key(), NOW),
            Err(Error::Malformed)
        ));
        Ok(())
    }

    #[test]
    fn claims_default_resources_and_expiry() {
        let claims = Claims::new("a@b.c", &[], Duration::from_secs(90), NOW);
        assert_eq!(claims.resources, vec!["/".to_string()]);
        assert_eq!(claims.expires, NOW + 90);
    }

    #[test]
    fn claims_authorize_by_prefix() {
        let claims = Claims::new(
            "a@b.c",
            &["/private".to_string()],
            Duration::from_secs(60),
            NOW,
        );
        assert!(claims.authorizes("/private"));
        assert!(claims.authorizes("/private/x"));
        assert!(!claims.authorizes("/priv"));
        assert!(!claims.authorizes("/Private"));
        assert!(!claims.authorizes("/"));
    }

    #[test]
    fn codec_uses_current_time() -> Result<(), Error> {
        let codec = ClaimsCodec::new(Arc::new(signing_keys()));
        let now = Utc::now().timestamp();
        let fresh = Claims::new("a@b.c", &[], Duration::from_secs(60), now);
        let token = codec.issue(&fresh)?;
        assert_eq!(codec.verify(&token)?, fresh);

        let stale = Claims {
            expires: now - 1,
            ..fresh
        };
        let token = codec.issue(&stale)?;
        assert!(matches!(codec.verify(&token), Err(Error::Expired)));
        Ok(())
    }
}
