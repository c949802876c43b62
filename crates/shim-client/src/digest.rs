//! HTTP digest authentication (RFC 2617 / RFC 7616, qop="auth").
//!
//! The shim sits behind a digest-authenticating front end; a 401
//! response carries a challenge that is answered exactly once per
//! exchange.

use md5::Md5;
use rand::Rng;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Algorithm {
    Md5,
    Sha256,
}

/// A parsed `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone)]
pub(crate) struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub qop_auth: bool,
    pub algorithm: Algorithm,
}

impl DigestChallenge {
    /// Parse the challenge header value. Returns `None` for schemes
    /// other than Digest or challenges missing realm/nonce.
    pub fn parse(header: &str) -> Option<Self> {
        let rest = header.trim().strip_prefix("Digest ")?;

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut qop_auth = false;
        let mut algorithm = Algorithm::Md5;

        for item in split_challenge_items(rest) {
            let (key, value) = item.split_once('=')?;
            let value = value.trim().trim_matches('"');
            match key.trim().to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value.to_string()),
                "nonce" => nonce = Some(value.to_string()),
                "opaque" => opaque = Some(value.to_string()),
                "qop" => qop_auth = value.split(',').any(|q| q.trim() == "auth"),
                "algorithm" => {
                    algorithm = match value.to_ascii_uppercase().as_str() {
                        "MD5" => Algorithm::Md5,
                        "SHA-256" => Algorithm::Sha256,
                        _ => return None,
                    }
                }
                _ => {}
            }
        }

        Some(Self {
            realm: realm?,
            nonce: nonce?,
            opaque,
            qop_auth,
            algorithm,
        })
    }

    /// Build the `Authorization` header value answering this challenge.
    pub fn respond(&self, user: &str, password: &str, method: &str, uri: &str) -> String {
        let cnonce = make_cnonce();
        self.respond_with_cnonce(user, password, method, uri, &cnonce, 1)
    }

    pub fn respond_with_cnonce(
        &self,
        user: &str,
        password: &str,
        method: &str,
        uri: &str,
        cnonce: &str,
        nc: u32,
    ) -> String {
        let h = |input: &str| hash(self.algorithm, input);

        let ha1 = h(&format!("{}:{}:{}", user, self.realm, password));
        let ha2 = h(&format!("{}:{}", method, uri));

        let nc_str = format!("{:08x}", nc);
        let response = if self.qop_auth {
            h(&format!(
                "{}:{}:{}:{}:auth:{}",
                ha1, self.nonce, nc_str, cnonce, ha2
            ))
        } else {
            h(&format!("{}:{}:{}", ha1, self.nonce, ha2))
        };

        let mut out = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\"",
            user, self.realm, self.nonce, uri, response
        );
        if self.qop_auth {
            out.push_str(&format!(", qop=auth, nc={}, cnonce=\"{}\"", nc_str, cnonce));
        }
        if let Some(opaque) = &self.opaque {
            out.push_str(&format!(", opaque=\"{}\"", opaque));
        }
        if self.algorithm == Algorithm::Sha256 {
            out.push_str(", algorithm=SHA-256");
        }
        out
    }
}

fn hash(algorithm: Algorithm, input: &str) -> String {
    match algorithm {
        Algorithm::Md5 => {
            let mut hasher = Md5::new();
            hasher.update(input.as_bytes());
            hex::encode(hasher.finalize())
        }
        Algorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(input.as_bytes());
            hex::encode(hasher.finalize())
        }
    }
}

fn make_cnonce() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Split challenge parameters on commas that are not inside quotes.
fn split_challenge_items(s: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                items.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(s[start..].trim());
    items.retain(|i| !i.is_empty());
    items
}
