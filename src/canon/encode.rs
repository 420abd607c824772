use super::{CanonValue, EncodeError};
use std::fmt::Write as _;

/// Encodes `value` as canonical JSON bytes: no whitespace, object keys in
/// ascending UTF-8 byte order, fixed-precision numerics, stable escaping.
///
/// Never emits partial output: a write failure anywhere in the tree aborts
/// with `Err` and no returned bytes.
pub fn encode(value: &CanonValue) -> Result<Vec<u8>, EncodeError> {
    let mut out = String::new();
    write_value(value, &mut out)?;
    Ok(out.into_bytes())
}

fn write_value(value: &CanonValue, out: &mut String) -> Result<(), EncodeError> {
    match value {
        CanonValue::Null => out.push_str("null"),
        CanonValue::Int(i) => {
            let _ = write!(out, "{i}");
        }
        CanonValue::Num { value, quantized } => write_number(*value, *quantized, out),
        CanonValue::Str(s) => write_string(s, out)?,
        CanonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        CanonValue::Object(fields) => {
            out.push('{');
            for (i, (key, val)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out)?;
                out.push(':');
                write_value(val, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_number(value: f64, quantized: bool, out: &mut String) {
    if value.is_nan() {
        out.push_str("null");
        return;
    }
    if value.is_infinite() {
        out.push_str(if value > 0.0 { "1e308" } else { "-1e308" });
        return;
    }
    out.push_str(&if quantized {
        format_q4(value)
    } else {
        format_plain(value)
    });
}

/// Fixed-point, 4 decimal digits, trailing fractional zeros trimmed, `-0`
/// normalized to `0`.
fn format_q4(value: f64) -> String {
    let scaled = (value.abs() * 10_000.0).round();
    if !scaled.is_finite() || scaled == 0.0 {
        return "0".to_string();
    }
    // Evidence-class fields live in small ranges; saturate defensively rather
    // than overflow i64 for a pathological caller.
    let scaled_i = if scaled >= i64::MAX as f64 {
        i64::MAX
    } else {
        scaled as i64
    };
    let int_part = scaled_i / 10_000;
    let frac_part = scaled_i % 10_000;
    let sign = if value.is_sign_negative() { "-" } else { "" };
    if frac_part == 0 {
        format!("{sign}{int_part}")
    } else {
        let frac_str = trim_trailing_zeros(&format!("{frac_part:04}"));
        format!("{sign}{int_part}.{frac_str}")
    }
}

/// Plain decimal notation with up to 15 significant digits, no scientific
/// notation, trailing fractional zeros trimmed.
fn format_plain(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let neg = value.is_sign_negative();
    let abs = value.abs();
    // 15 significant digits via scientific formatting, then reassembled into
    // plain notation by hand so the output never contains an `e`.
    let sci = format!("{abs:.14e}");
    let (mantissa, exp_str) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp_str.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let point_pos = 1 + exp;

    let body = if point_pos <= 0 {
        let zeros = "0".repeat((-point_pos) as usize);
        let frac = trim_trailing_zeros(&format!("{zeros}{digits}"));
        if frac.is_empty() {
            "0".to_string()
        } else {
            format!("0.{frac}")
        }
    } else if (point_pos as usize) >= digits.len() {
        let pad = "0".repeat(point_pos as usize - digits.len());
        format!("{digits}{pad}")
    } else {
        let (int_part, frac_part) = digits.split_at(point_pos as usize);
        let frac_trimmed = trim_trailing_zeros(frac_part);
        if frac_trimmed.is_empty() {
            int_part.to_string()
        } else {
            format!("{int_part}.{frac_trimmed}")
        }
    };

    if neg && body != "0" {
        format!("-{body}")
    } else {
        body
    }
}

fn trim_trailing_zeros(s: &str) -> &str {
    s.trim_end_matches('0')
}

fn write_string(s: &str, out: &mut String) -> Result<(), EncodeError> {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    Ok(())
}
