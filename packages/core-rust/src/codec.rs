//! ORB codec abstraction and the CDR encapsulation codec.
//!
//! Interceptors never marshal bytes themselves: they obtain a [`Codec`] from
//! the ORB's [`CodecFactory`] once at initialisation and hand it typed
//! [`Value`]s. [`CdrCodecFactory`] is the in-crate factory for CDR
//! encapsulation versions 1.0 through 1.2.

use std::sync::Arc;

use tracing::debug;

use crate::cdr::{from_encapsulation, to_encapsulation};
use crate::context::PropagationContext;
use crate::error::CodecError;

/// Encoding format id of CDR encapsulation.
pub const ENCODING_CDR_ENCAPS: i16 = 0;

/// Encoding requested from a [`CodecFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Encoding {
    pub format: i16,
    pub major: u8,
    pub minor: u8,
}

impl Encoding {
    /// CDR encapsulation 1.2, the encoding used for every transaction
    /// context and policy component.
    pub const CDR_ENCAPS_1_2: Self = Self {
        format: ENCODING_CDR_ENCAPS,
        major: 1,
        minor: 2,
    };
}

/// Type of a value to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    /// IDL `short`, used for policy values.
    Short,
    /// `CosTransactions::PropagationContext`.
    PropagationContext,
}

/// Typed value handed to or returned by a codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Short(i16),
    PropagationContext(PropagationContext),
}

impl Value {
    #[must_use]
    pub fn type_code(&self) -> TypeCode {
        match self {
            Self::Short(_) => TypeCode::Short,
            Self::PropagationContext(_) => TypeCode::PropagationContext,
        }
    }
}

/// Converts typed values to and from opaque octet sequences.
pub trait Codec: Send + Sync {
    /// The encoding this codec produces.
    fn encoding(&self) -> Encoding;

    /// Encodes a value.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidTypeForEncoding`] if the codec cannot
    /// represent the value.
    fn encode_value(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    /// Decodes a value of the given type.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FormatMismatch`] for malformed data.
    fn decode_value(&self, data: &[u8], tc: TypeCode) -> Result<Value, CodecError>;
}

impl<'c> dyn Codec + 'c {
    /// Encodes an IDL `short`.
    ///
    /// # Errors
    ///
    /// Propagates the codec's encoding error.
    pub fn encode_short(&self, v: i16) -> Result<Vec<u8>, CodecError> {
        self.encode_value(&Value::Short(v))
    }

    /// Decodes an IDL `short`.
    ///
    /// # Errors
    ///
    /// Returns the codec's decoding error, or [`CodecError::TypeMismatch`] if
    /// the codec hands back another type.
    pub fn decode_short(&self, data: &[u8]) -> Result<i16, CodecError> {
        match self.decode_value(data, TypeCode::Short)? {
            Value::Short(v) => Ok(v),
            Value::PropagationContext(_) => Err(CodecError::TypeMismatch { expected: "short" }),
        }
    }

    /// Encodes a propagation context.
    ///
    /// # Errors
    ///
    /// Propagates the codec's encoding error.
    pub fn encode_context(&self, ctx: &PropagationContext) -> Result<Vec<u8>, CodecError> {
        self.encode_value(&Value::PropagationContext(ctx.clone()))
    }

    /// Decodes a propagation context.
    ///
    /// # Errors
    ///
    /// Returns the codec's decoding error, or [`CodecError::TypeMismatch`] if
    /// the codec hands back another type.
    pub fn decode_context(&self, data: &[u8]) -> Result<PropagationContext, CodecError> {
        match self.decode_value(data, TypeCode::PropagationContext)? {
            Value::PropagationContext(ctx) => Ok(ctx),
            Value::Short(_) => Err(CodecError::TypeMismatch {
                expected: "PropagationContext",
            }),
        }
    }
}

/// Creates codecs for a requested encoding.
pub trait CodecFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownEncoding`] for unsupported encodings.
    fn create_codec(&self, encoding: Encoding) -> Result<Arc<dyn Codec>, CodecError>;
}

// ---------------------------------------------------------------------------
// CdrCodec
// ---------------------------------------------------------------------------

/// CDR encapsulation codec.
///
/// Versions 1.0 to 1.2 share one layout for the types handled here.
#[derive(Debug, Clone, Copy)]
pub struct CdrCodec {
    encoding: Encoding,
}

impl Codec for CdrCodec {
    fn encoding(&self) -> Encoding {
        self.encoding
    }

    fn encode_value(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(match value {
            Value::Short(v) => to_encapsulation(v),
            Value::PropagationContext(ctx) => to_encapsulation(ctx),
        })
    }

    fn decode_value(&self, data: &[u8], tc: TypeCode) -> Result<Value, CodecError> {
        Ok(match tc {
            TypeCode::Short => Value::Short(from_encapsulation(data)?),
            TypeCode::PropagationContext => Value::PropagationContext(from_encapsulation(data)?),
        })
    }
}

/// Factory for [`CdrCodec`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct CdrCodecFactory;

impl CodecFactory for CdrCodecFactory {
    fn create_codec(&self, encoding: Encoding) -> Result<Arc<dyn Codec>, CodecError> {
        if encoding.format != ENCODING_CDR_ENCAPS || encoding.major != 1 || encoding.minor > 2 {
            return Err(CodecError::UnknownEncoding {
                format: encoding.format,
                major: encoding.major,
                minor: encoding.minor,
            });
        }
        debug!(
            major = encoding.major,
            minor = encoding.minor,
            "created CDR encapsulation codec"
        );
        Ok(Arc::new(CdrCodec { encoding }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> Arc<dyn Codec> {
        CdrCodecFactory.create_codec(Encoding::CDR_ENCAPS_1_2).unwrap()
    }

    #[test]
    fn factory_accepts_cdr_1_0_to_1_2() {
        for minor in 0..=2 {
            let enc = Encoding {
                format: ENCODING_CDR_ENCAPS,
                major: 1,
                minor,
            };
            assert_eq!(CdrCodecFactory.create_codec(enc).unwrap().encoding(), enc);
        }
    }

    #[test]
    fn factory_rejects_other_encodings() {
        let enc = Encoding {
            format: 1,
            major: 1,
            minor: 2,
        };
        assert!(matches!(
            CdrCodecFactory.create_codec(enc),
            Err(CodecError::UnknownEncoding { format: 1, .. })
        ));
        let enc = Encoding {
            minor: 3,
            ..Encoding::CDR_ENCAPS_1_2
        };
        assert!(CdrCodecFactory.create_codec(enc).is_err());
    }

    #[test]
    fn short_helpers() {
        let codec = codec();
        let bytes = codec.encode_short(3).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 3]);
        assert_eq!(codec.decode_short(&bytes), Ok(3));
    }

    #[test]
    fn context_helpers() {
        let codec = codec();
        let bytes = codec.encode_context(&PropagationContext::dummy()).unwrap();
        assert!(codec.decode_context(&bytes).unwrap().is_dummy());
    }

    #[test]
    fn garbage_is_format_mismatch() {
        let codec = codec();
        assert!(matches!(
            codec.decode_context(&[0, 1, 2]),
            Err(CodecError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn value_type_codes() {
        assert_eq!(Value::Short(1).type_code(), TypeCode::Short);
        assert_eq!(
            Value::PropagationContext(PropagationContext::null()).type_code(),
            TypeCode::PropagationContext
        );
    }
}
