//! PEM armor decoding and encoding.
//!
//! Produces the DER payloads of the armored blocks whose tag is on the
//! caller's accepted list, in file order. Blocks with other tags are
//! skipped without being decoded.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use nettls_types::TlsError;

pub const TAG_X509_CERTIFICATE: &str = "X509 CERTIFICATE";
pub const TAG_CERTIFICATE: &str = "CERTIFICATE";
pub const TAG_X509_CRL: &str = "X509 CRL";
pub const TAG_RSA_PRIVATE_KEY: &str = "RSA PRIVATE KEY";
pub const TAG_DSA_PRIVATE_KEY: &str = "DSA PRIVATE KEY";
pub const TAG_EC_PRIVATE_KEY: &str = "EC PRIVATE KEY";
pub const TAG_PRIVATE_KEY: &str = "PRIVATE KEY";
pub const TAG_ENCRYPTED_PRIVATE_KEY: &str = "ENCRYPTED PRIVATE KEY";
pub const TAG_DH_PARAMETERS: &str = "DH PARAMETERS";

/// Tags accepted when loading trust anchors or certificate chains.
pub const CERT_TAGS: &[&str] = &[TAG_X509_CERTIFICATE, TAG_CERTIFICATE];
/// Tags accepted when loading revocation lists.
pub const CRL_TAGS: &[&str] = &[TAG_X509_CRL];
/// Tags accepted when loading private keys.
pub const KEY_TAGS: &[&str] = &[
    TAG_RSA_PRIVATE_KEY,
    TAG_DSA_PRIVATE_KEY,
    TAG_EC_PRIVATE_KEY,
    TAG_PRIVATE_KEY,
    TAG_ENCRYPTED_PRIVATE_KEY,
];
/// Tags accepted when loading Diffie-Hellman parameters.
pub const DH_TAGS: &[&str] = &[TAG_DH_PARAMETERS];

const BEGIN_PREFIX: &str = "-----BEGIN ";
const END_PREFIX: &str = "-----END ";
const DASHES_SUFFIX: &str = "-----";

/// A decoded armor block.
#[derive(Debug, Clone)]
pub struct PemBlock {
    /// The armor tag, e.g. `CERTIFICATE`.
    pub tag: String,
    /// The DER payload.
    pub der: Vec<u8>,
}

/// Decode the accepted armor blocks of `input`, preserving order.
///
/// Fails with `ParseError` when a block has no END marker or an accepted
/// block carries invalid base64, and with `EmptyPem` when nothing was
/// accepted and the caller did not opt into empty results.
pub fn decode(input: &str, accepted: &[&str], allow_empty: bool) -> Result<Vec<PemBlock>, TlsError> {
    let mut blocks = Vec::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next() {
        let line = line.trim();
        let Some(tag) = line
            .strip_prefix(BEGIN_PREFIX)
            .and_then(|s| s.strip_suffix(DASHES_SUFFIX))
        else {
            continue;
        };

        let end_marker = format!("{END_PREFIX}{tag}{DASHES_SUFFIX}");
        let wanted = accepted.contains(&tag);
        let mut payload = String::new();
        let mut found_end = false;
        for inner in lines.by_ref() {
            let inner = inner.trim();
            if inner == end_marker {
                found_end = true;
                break;
            }
            if wanted {
                payload.push_str(inner);
            }
        }
        if !found_end {
            return Err(TlsError::ParseError(format!(
                "PEM block `{tag}` has no matching END marker"
            )));
        }
        if wanted {
            let der = BASE64
                .decode(&payload)
                .map_err(|e| TlsError::ParseError(format!("PEM block `{tag}`: {e}")))?;
            blocks.push(PemBlock {
                tag: tag.to_string(),
                der,
            });
        }
    }

    if blocks.is_empty() && !allow_empty {
        return Err(TlsError::EmptyPem);
    }
    Ok(blocks)
}

/// [`decode`] over the contents of a file.
pub fn decode_file(
    path: &Path,
    accepted: &[&str],
    allow_empty: bool,
) -> Result<Vec<PemBlock>, TlsError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| TlsError::ParseError(format!("{}: {e}", path.display())))?;
    decode(&text, accepted, allow_empty)
}

/// Armor `der` under `tag`, wrapping the base64 payload at 64 columns.
pub fn encode(tag: &str, der: &[u8]) -> String {
    let payload = BASE64.encode(der);
    let mut out = format!("{BEGIN_PREFIX}{tag}{DASHES_SUFFIX}\n");
    for chunk in payload.as_bytes().chunks(64) {
        // chunks of an ASCII string are valid UTF-8
        out.push_str(std::str::from_utf8(chunk).unwrap());
        out.push('\n');
    }
    out.push_str(&format!("{END_PREFIX}{tag}{DASHES_SUFFIX}\n"));
    out
}
