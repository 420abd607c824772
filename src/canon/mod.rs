//! Canonical, byte-identical JSON: sorted object keys, fixed-precision
//! numerics chosen by field name (C4), stable escaping, no partial output on
//! failure.
//!
//! `CanonValue` is a small value tree, independent of the engine's typed
//! snapshot structs; `crate::snapshot` builds one from a `Snapshot` and hands
//! it to [`encode`]. This mirrors how `warp-core`'s `telemetry` module
//! hand-formats JSON rather than reaching for `serde_json`: determinism of
//! the byte output is a correctness requirement here, not a nicety, so the
//! encoder is written by hand end to end.

mod decode;
mod encode;

use std::collections::BTreeMap;

pub use decode::{decode, DecodeErrorKind};
pub use encode::encode;

/// A canonical JSON value. Object keys are kept in a [`BTreeMap`], which
/// sorts by `Ord` on `String` -- equivalent to ascending UTF-8 byte order
/// for valid UTF-8, satisfying I7/P11 without the encoder needing to sort
/// anything itself.
#[derive(Clone, Debug, PartialEq)]
pub enum CanonValue {
    /// JSON `null` (also the encoding of `NaN`).
    Null,
    /// A signed integer, encoded as decimal ASCII with no leading zeros.
    Int(i64),
    /// A real number. `quantized` selects fixed-point-4-decimals (C4's
    /// quantized field set) vs. the 15-significant-digit plain form.
    Num {
        /// The value to encode.
        value: f64,
        /// Whether this field is in the quantized set (see [`crate::quant`]).
        quantized: bool,
    },
    /// A UTF-8 string.
    Str(String),
    /// An ordered array; element order is preserved verbatim.
    Array(Vec<CanonValue>),
    /// An object; always serialized with keys in ascending UTF-8 byte order.
    Object(BTreeMap<String, CanonValue>),
}

impl CanonValue {
    /// Builds a quantized (4-decimal fixed point) number value.
    #[must_use]
    pub fn quantized(value: f64) -> Self {
        Self::Num {
            value,
            quantized: true,
        }
    }

    /// Builds a plain (15-significant-digit) number value.
    #[must_use]
    pub fn plain(value: f64) -> Self {
        Self::Num {
            value,
            quantized: false,
        }
    }

    /// Builds a number value, consulting the field-name quantization policy
    /// (C4) to choose the representation.
    #[must_use]
    pub fn for_field(field: &str, value: f64) -> Self {
        if crate::quant::is_quantized(field) {
            Self::quantized(value)
        } else {
            Self::plain(value)
        }
    }

    /// Builds an object from `(field, value)` pairs, inserting into a
    /// [`BTreeMap`] so duplicate keys keep last-write-wins semantics and
    /// iteration is always key-sorted.
    #[must_use]
    pub fn object(fields: impl IntoIterator<Item = (String, CanonValue)>) -> Self {
        Self::Object(fields.into_iter().collect())
    }
}

/// Error produced when encoding a [`CanonValue`] tree fails.
///
/// The encoder never emits partial output: on error the caller gets `Err`
/// and no bytes.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// A string contained a lone UTF-16 surrogate or otherwise could not be
    /// escaped deterministically. Carries a human-readable reason.
    #[error("could not encode string: {0}")]
    InvalidString(String),
}
