use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier as _;
use rsa::{BigUint, RsaPublicKey};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;

/// Name of the cookie carrying the identity-provider token.
pub const TOKEN_COOKIE: &str = "token";

/// Decoded identity claims proving who the caller is.
#[derive(Debug, Clone)]
pub struct IdentityClaims {
    pub user_id: String,
    pub email: String,
}

#[derive(Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: String,
    e: String,
}

#[derive(Deserialize)]
struct TokenHeader {
    alg: String,
    kid: Option<String>,
}

#[derive(Deserialize)]
struct TokenPayload {
    sub: String,
    email: Option<String>,
    exp: i64,
    iss: Option<String>,
}

/// Verifies identity-provider tokens locally against cached public keys.
/// Keys are parsed once at startup; verification is a signature check,
/// not a network round-trip.
pub struct TokenVerifier {
    keys: HashMap<String, RsaPublicKey>,
    issuer: Option<String>,
}

impl TokenVerifier {
    pub fn from_jwks(jwks_json: &str, issuer: Option<String>) -> Result<Self, String> {
        let set: JwkSet =
            serde_json::from_str(jwks_json).map_err(|e| format!("JWKS parse error: {}", e))?;

        let mut keys = HashMap::new();
        for jwk in set.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            let n = URL_SAFE_NO_PAD
                .decode(jwk.n.as_bytes())
                .map_err(|e| format!("JWKS modulus decode error: {}", e))?;
            let e = URL_SAFE_NO_PAD
                .decode(jwk.e.as_bytes())
                .map_err(|e| format!("JWKS exponent decode error: {}", e))?;
            let key = RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))
                .map_err(|e| format!("JWKS key error: {}", e))?;
            keys.insert(jwk.kid, key);
        }

        if keys.is_empty() {
            return Err("JWKS contained no usable RSA keys".to_string());
        }

        Ok(Self { keys, issuer })
    }

    /// Validate a bearer token. Any failure (malformed, expired, bad
    /// signature, unknown key) is logged and collapses to None, so the
    /// caller is treated as anonymous.
    pub fn verify(&self, token: &str) -> Option<IdentityClaims> {
        match self.check(token) {
            Ok(claims) => Some(claims),
            Err(err) => {
                tracing::warn!("Token validation failed: {}", err);
                None
            }
        }
    }

    fn check(&self, token: &str) -> Result<IdentityClaims, String> {
        let mut parts = token.split('.');
        let (header_b64, payload_b64, sig_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => return Err("not a compact JWT".to_string()),
            };

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|e| format!("header decode: {}", e))?;
        let header: TokenHeader =
            serde_json::from_slice(&header_bytes).map_err(|e| format!("header parse: {}", e))?;

        if header.alg != "RS256" {
            return Err(format!("unsupported alg {}", header.alg));
        }

        let kid = header.kid.ok_or("missing kid")?;
        let key = self
            .keys
            .get(&kid)
            .ok_or_else(|| format!("unknown kid {}", kid))?;

        let sig_bytes = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|e| format!("signature decode: {}", e))?;
        let signature = Signature::try_from(sig_bytes.as_slice())
            .map_err(|e| format!("signature parse: {}", e))?;

        let signed = format!("{}.{}", header_b64, payload_b64);
        VerifyingKey::<Sha256>::new(key.clone())
            .verify(signed.as_bytes(), &signature)
            .map_err(|_| "signature mismatch".to_string())?;

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|e| format!("payload decode: {}", e))?;
        let payload: TokenPayload =
            serde_json::from_slice(&payload_bytes).map_err(|e| format!("payload parse: {}", e))?;

        if payload.exp < chrono::Utc::now().timestamp() {
            return Err("token expired".to_string());
        }

        if let Some(expected) = &self.issuer {
            if payload.iss.as_deref() != Some(expected.as_str()) {
                return Err("issuer mismatch".to_string());
            }
        }

        Ok(IdentityClaims {
            user_id: payload.sub,
            email: payload.email.unwrap_or_default(),
        })
    }
}

/// Pull the token cookie value out of a Cookie header, if present.
pub fn token_from_cookie_header(cookie_header: Option<&str>) -> Option<&str> {
    for pair in cookie_header?.split(';') {
        if let Some((name, value)) = pair.trim().split_once('=') {
            if name == TOKEN_COOKIE && !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}
