// crates/hopchain-core/src/canonical.rs
//
// Canonical JSON encoding used before every signature digest.
//
// Rules (frozen; changing any of them invalidates every stored signature):
//   - object keys sorted by their UTF-8 bytes, at every depth
//   - no insignificant whitespace
//   - arrays keep their order
//   - strings use JSON escaping of `"`, `\\` and control characters only
//   - integers are written in plain decimal
//   - floats are written as ECMAScript's Number-to-String does (RFC 8785):
//     shortest round-trip digits, no fraction on integral values, exponent
//     form outside [1e-6, 1e21), and `0` for negative zero
//
// The writer walks the value itself instead of trusting the map type behind
// `serde_json::Value`, which changes with the `preserve_order` feature.

use serde::Serialize;
use serde_json::Value;

use crate::crypto::CryptoProvider;
use crate::error::HopchainError;

/// Identifier recorded in export metadata for this encoding.
pub const CANONICAL_ENCODING: &str = "json-sorted-keys-compact/v1";

/// Serialize `value` to its canonical JSON string.
pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> Result<String, HopchainError> {
    let value = serde_json::to_value(value)?;
    let mut out = String::new();
    write_value(&value, &mut out)?;
    Ok(out)
}

/// Serialize `value` canonically and return its bytes.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HopchainError> {
    to_canonical_string(value).map(String::into_bytes)
}

/// Hex digest of the canonical encoding of `value`.
pub fn canonical_digest_hex<T: Serialize + ?Sized>(
    crypto: &dyn CryptoProvider,
    value: &T,
) -> Result<String, HopchainError> {
    crypto.digest_hex(&to_canonical_bytes(value)?)
}

fn write_value(value: &Value, out: &mut String) -> Result<(), HopchainError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out),
        Value::String(s) => out.push_str(&serde_json::to_string(s)?),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_value(item, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_number(n: &serde_json::Number, out: &mut String) {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
    } else if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
    } else if let Some(f) = n.as_f64() {
        out.push_str(&format_float(f));
    }
}

/// ECMAScript Number-to-String for a finite f64.
fn format_float(f: f64) -> String {
    if f == 0.0 {
        return "0".to_string();
    }
    // `{:e}` yields the shortest digits that round-trip, as `d[.ddd]e<exp>`.
    let sci = format!("{:e}", f.abs());
    let (mantissa, exp) = match sci.split_once('e') {
        Some(parts) => parts,
        None => (sci.as_str(), "0"),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exp: i32 = exp.parse().unwrap_or(0);
    let k = digits.len() as i32;
    // Position of the decimal point relative to the start of `digits`.
    let n = exp + 1;

    let mut out = String::new();
    if f < 0.0 {
        out.push('-');
    }
    if k <= n && n <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat('0').take((n - k) as usize));
    } else if 0 < n && n <= 21 {
        let (int, frac) = digits.split_at(n as usize);
        out.push_str(int);
        out.push('.');
        out.push_str(frac);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take((-n) as usize));
        out.push_str(&digits);
    } else {
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        out.push('e');
        out.push(if n - 1 >= 0 { '+' } else { '-' });
        out.push_str(&(n - 1).abs().to_string());
    }
    out
}
