//! Crypto: hashing, encoding and AES-256-GCM
//!
//! Encrypted payloads are base64 of `iv (12 bytes) ‖ tag (16 bytes) ‖
//! ciphertext`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use md5::Md5;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use sha2::{Digest, Sha256};

use super::{number_arg, optional_number, require_args, text_arg, unknown, BuiltinResult, EvalError};
use crate::runtime::evaluator::Evaluator;
use crate::runtime::host::Host;
use crate::runtime::value::Value;

pub const KEY_LEN: usize = 32;
const TAG_LEN: usize = 16;
/// Widest `randomInt` span every member of which is an exact f64 (2^53)
const MAX_RANDOM_SPAN: f64 = 9_007_199_254_740_992.0;

/// Turn any key text into exactly 32 bytes. Hex is decoded first; 32 bytes
/// are used as-is, longer keys are truncated and shorter ones hashed.
pub fn normalize_key(key: &str) -> [u8; KEY_LEN] {
    let bytes = hex::decode(key).unwrap_or_else(|_| key.as_bytes().to_vec());
    let mut out = [0u8; KEY_LEN];
    if bytes.len() >= KEY_LEN {
        out.copy_from_slice(&bytes[..KEY_LEN]);
    } else {
        out.copy_from_slice(&Sha256::digest(&bytes));
    }
    out
}

fn cipher(key: &str) -> Result<LessSafeKey, EvalError> {
    let unbound = UnboundKey::new(&AES_256_GCM, &normalize_key(key))
        .map_err(|_| EvalError::new("invalid key"))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plain` with a fresh IV drawn from the host
pub fn encrypt(host: &mut dyn Host, plain: &str, key: &str) -> Result<String, EvalError> {
    let mut iv = [0u8; NONCE_LEN];
    host.random_bytes(&mut iv)?;
    let mut buffer = plain.as_bytes().to_vec();
    let tag = cipher(key)?
        .seal_in_place_separate_tag(Nonce::assume_unique_for_key(iv), Aad::empty(), &mut buffer)
        .map_err(|_| EvalError::new("encryption failed"))?;

    let mut payload = Vec::with_capacity(NONCE_LEN + TAG_LEN + buffer.len());
    payload.extend_from_slice(&iv);
    payload.extend_from_slice(tag.as_ref());
    payload.extend_from_slice(&buffer);
    Ok(STANDARD.encode(payload))
}

pub fn decrypt(payload: &str, key: &str) -> Result<String, EvalError> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| EvalError::new("payload is not valid base64"))?;
    if bytes.len() < NONCE_LEN + TAG_LEN {
        return Err(EvalError::new("payload is too short"));
    }
    let (iv, rest) = bytes.split_at(NONCE_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);
    let nonce = Nonce::try_assume_unique_for_key(iv)
        .map_err(|_| EvalError::new("invalid IV"))?;

    // ring expects ciphertext followed by tag
    let mut buffer = Vec::with_capacity(rest.len());
    buffer.extend_from_slice(ciphertext);
    buffer.extend_from_slice(tag);
    let plain = cipher(key)?
        .open_in_place(nonce, Aad::empty(), &mut buffer)
        .map_err(|_| EvalError::new("decryption failed: wrong key or corrupted payload"))?;
    String::from_utf8(plain.to_vec()).map_err(|_| EvalError::new("decrypted data is not UTF-8"))
}

impl Evaluator<'_> {
    pub(super) fn call_crypto(&mut self, name: &str, args: &[Value]) -> BuiltinResult {
        match name {
            "md5" => Ok(Value::Text(hex::encode(Md5::digest(text_arg(args, 0)?)))),
            "sha256" => Ok(Value::Text(hex::encode(Sha256::digest(text_arg(args, 0)?)))),
            "base64Encode" => Ok(Value::Text(STANDARD.encode(text_arg(args, 0)?))),
            "base64Decode" => {
                let bytes = STANDARD
                    .decode(text_arg(args, 0)?.trim())
                    .map_err(|e| EvalError::new(format!("invalid base64: {}", e)))?;
                Ok(Value::Text(String::from_utf8_lossy(&bytes).into_owned()))
            }
            "generateKey" => {
                let len = optional_number(args, 0)?.unwrap_or(KEY_LEN as f64);
                if !(1.0..=1024.0).contains(&len) {
                    return Err(EvalError::new("key length must be between 1 and 1024 bytes"));
                }
                let mut bytes = vec![0u8; len as usize];
                self.host.random_bytes(&mut bytes)?;
                Ok(Value::Text(hex::encode(bytes)))
            }
            "uuid" => {
                let mut bytes = [0u8; 16];
                self.host.random_bytes(&mut bytes)?;
                let id = uuid::Builder::from_random_bytes(bytes).into_uuid();
                Ok(Value::Text(id.to_string()))
            }
            "encrypt" => {
                require_args(args, 2)?;
                let plain = text_arg(args, 0)?;
                let key = text_arg(args, 1)?;
                Ok(Value::Text(encrypt(&mut *self.host, &plain, &key)?))
            }
            "decrypt" => {
                require_args(args, 2)?;
                Ok(Value::Text(decrypt(&text_arg(args, 0)?, &text_arg(args, 1)?)?))
            }
            "randomInt" => {
                let low = number_arg(args, 0)?.ceil();
                let high = number_arg(args, 1)?.floor();
                if !(low.is_finite() && high.is_finite()) || high < low {
                    return Err(EvalError::new(format!("empty range [{}, {}]", low, high)));
                }
                if high - low >= MAX_RANDOM_SPAN {
                    return Err(EvalError::new(format!(
                        "range [{}, {}] is wider than 2^53",
                        low, high
                    )));
                }
                let span = (high - low) as u64 + 1;
                let mut bytes = [0u8; 8];
                self.host.random_bytes(&mut bytes)?;
                let offset = u64::from_le_bytes(bytes) % span;
                Ok(Value::Number(low + offset as f64))
            }
            _ => Err(unknown(name)),
        }
    }
}
