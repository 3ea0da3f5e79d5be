//! Transaction propagation context (`CosTransactions::PropagationContext`).
//!
//! The context travels in the transaction service context of every request
//! and reply that takes part in a distributed transaction. Two sentinel
//! contexts never name a real transaction:
//!
//! - the **null context** tells the target that no transaction is propagated
//!   on purpose (interoperability mode disabled);
//! - the **dummy context** tells a co-located target that the calling thread
//!   already carries the transaction and nothing needs to be imported.

use serde::{Deserialize, Serialize};

use crate::cdr::{CdrDecode, CdrEncode, CdrReader, CdrWriter};
use crate::error::CodecError;

// ---------------------------------------------------------------------------
// Object references
// ---------------------------------------------------------------------------

/// One profile of an object reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaggedProfile {
    pub tag: u32,
    #[serde(with = "serde_bytes")]
    pub profile_data: Vec<u8>,
}

/// Minimal interoperable object reference: repository type id plus profiles.
///
/// The nil reference is encoded as an empty type id with no profiles and is
/// represented as `None` wherever a reference is optional.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub type_id: String,
    pub profiles: Vec<TaggedProfile>,
}

impl ObjectRef {
    #[must_use]
    pub fn new(type_id: impl Into<String>, profiles: Vec<TaggedProfile>) -> Self {
        Self {
            type_id: type_id.into(),
            profiles,
        }
    }

    fn is_nil_encoding(&self) -> bool {
        self.type_id.is_empty() && self.profiles.is_empty()
    }
}

impl CdrEncode for TaggedProfile {
    fn encode(&self, w: &mut CdrWriter) {
        w.write_ulong(self.tag);
        w.write_octet_seq(&self.profile_data);
    }
}

impl CdrDecode for TaggedProfile {
    fn decode(r: &mut CdrReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            tag: r.read_ulong()?,
            profile_data: r.read_octet_seq()?,
        })
    }
}

impl CdrEncode for Option<ObjectRef> {
    fn encode(&self, w: &mut CdrWriter) {
        match self {
            Some(obj) => {
                w.write_string(&obj.type_id);
                w.write_seq(&obj.profiles);
            }
            None => {
                w.write_string("");
                w.write_ulong(0);
            }
        }
    }
}

impl CdrDecode for Option<ObjectRef> {
    fn decode(r: &mut CdrReader<'_>) -> Result<Self, CodecError> {
        let obj = ObjectRef {
            type_id: r.read_string()?,
            profiles: r.read_seq()?,
        };
        Ok(if obj.is_nil_encoding() { None } else { Some(obj) })
    }
}

// ---------------------------------------------------------------------------
// Transaction identity
// ---------------------------------------------------------------------------

/// Transaction identifier (`CosTransactions::otid_t`), XA-compatible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Otid {
    pub format_id: i32,
    pub bqual_length: i32,
    #[serde(with = "serde_bytes")]
    pub tid: Vec<u8>,
}

impl CdrEncode for Otid {
    fn encode(&self, w: &mut CdrWriter) {
        w.write_long(self.format_id);
        w.write_long(self.bqual_length);
        w.write_octet_seq(&self.tid);
    }
}

impl CdrDecode for Otid {
    fn decode(r: &mut CdrReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            format_id: r.read_long()?,
            bqual_length: r.read_long()?,
            tid: r.read_octet_seq()?,
        })
    }
}

/// Coordinator and terminator references plus the transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransIdentity {
    pub coord: Option<ObjectRef>,
    pub term: Option<ObjectRef>,
    pub otid: Otid,
}

impl CdrEncode for TransIdentity {
    fn encode(&self, w: &mut CdrWriter) {
        self.coord.encode(w);
        self.term.encode(w);
        self.otid.encode(w);
    }
}

impl CdrDecode for TransIdentity {
    fn decode(r: &mut CdrReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            coord: Option::<ObjectRef>::decode(r)?,
            term: Option::<ObjectRef>::decode(r)?,
            otid: Otid::decode(r)?,
        })
    }
}

// ---------------------------------------------------------------------------
// AnyValue
// ---------------------------------------------------------------------------

const TK_NULL: u32 = 0;
const TK_VOID: u32 = 1;
const TK_SHORT: u32 = 2;
const TK_LONG: u32 = 3;
const TK_BOOLEAN: u32 = 8;
const TK_STRING: u32 = 18;

/// The simple-typed `any` values carried as implementation-specific data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnyValue {
    Null,
    Void,
    Boolean(bool),
    Short(i16),
    Long(i32),
    String(String),
}

impl AnyValue {
    /// Extracts a boolean; `None` if the `any` holds another type.
    #[must_use]
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Extracts a short; `None` if the `any` holds another type.
    #[must_use]
    pub fn as_short(&self) -> Option<i16> {
        match self {
            Self::Short(v) => Some(*v),
            _ => None,
        }
    }
}

impl CdrEncode for AnyValue {
    fn encode(&self, w: &mut CdrWriter) {
        match self {
            Self::Null => w.write_ulong(TK_NULL),
            Self::Void => w.write_ulong(TK_VOID),
            Self::Boolean(b) => {
                w.write_ulong(TK_BOOLEAN);
                w.write_boolean(*b);
            }
            Self::Short(v) => {
                w.write_ulong(TK_SHORT);
                w.write_short(*v);
            }
            Self::Long(v) => {
                w.write_ulong(TK_LONG);
                w.write_long(*v);
            }
            Self::String(s) => {
                w.write_ulong(TK_STRING);
                // unbounded
                w.write_ulong(0);
                w.write_string(s);
            }
        }
    }
}

impl CdrDecode for AnyValue {
    fn decode(r: &mut CdrReader<'_>) -> Result<Self, CodecError> {
        match r.read_ulong()? {
            TK_NULL => Ok(Self::Null),
            TK_VOID => Ok(Self::Void),
            TK_BOOLEAN => Ok(Self::Boolean(r.read_boolean()?)),
            TK_SHORT => Ok(Self::Short(r.read_short()?)),
            TK_LONG => Ok(Self::Long(r.read_long()?)),
            TK_STRING => {
                let _bound = r.read_ulong()?;
                Ok(Self::String(r.read_string()?))
            }
            kind => Err(CodecError::format(format!(
                "unsupported TypeCode kind {kind} in any"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// PropagationContext
// ---------------------------------------------------------------------------

/// Wire-level transaction context.
///
/// `timeout` is the IDL `unsigned long` reinterpreted as a signed value so
/// that the dummy sentinel reads as `-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropagationContext {
    pub timeout: i32,
    pub current: TransIdentity,
    pub parents: Vec<TransIdentity>,
    pub implementation_specific_data: AnyValue,
}

impl PropagationContext {
    /// Timeout value that marks the dummy context.
    pub const DUMMY_TIMEOUT: i32 = -1;

    /// The explicit "no transaction, by policy" context.
    #[must_use]
    pub fn null() -> Self {
        Self {
            timeout: 0,
            current: TransIdentity {
                coord: None,
                term: None,
                otid: Otid {
                    format_id: 0,
                    bqual_length: 0,
                    tid: Vec::new(),
                },
            },
            parents: Vec::new(),
            implementation_specific_data: AnyValue::Boolean(false),
        }
    }

    /// The co-located call marker.
    #[must_use]
    pub fn dummy() -> Self {
        Self {
            timeout: Self::DUMMY_TIMEOUT,
            current: TransIdentity {
                coord: None,
                term: None,
                otid: Otid {
                    format_id: -1,
                    bqual_length: 0,
                    tid: Vec::new(),
                },
            },
            parents: Vec::new(),
            implementation_specific_data: AnyValue::Boolean(true),
        }
    }

    /// `true` when neither a coordinator nor a terminator is carried.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.current.coord.is_none() && self.current.term.is_none()
    }

    /// `true` for the dummy context: null identity, timeout `-1` and a
    /// boolean `true` as implementation-specific data. A non-boolean
    /// payload never marks a dummy context.
    #[must_use]
    pub fn is_dummy(&self) -> bool {
        self.implementation_specific_data.as_boolean() == Some(true)
            && self.is_null()
            && self.timeout == Self::DUMMY_TIMEOUT
    }
}

impl CdrEncode for PropagationContext {
    fn encode(&self, w: &mut CdrWriter) {
        #[allow(clippy::cast_sign_loss)]
        w.write_ulong(self.timeout as u32);
        self.current.encode(w);
        w.write_seq(&self.parents);
        self.implementation_specific_data.encode(w);
    }
}

impl CdrDecode for PropagationContext {
    fn decode(r: &mut CdrReader<'_>) -> Result<Self, CodecError> {
        #[allow(clippy::cast_possible_wrap)]
        let timeout = r.read_ulong()? as i32;
        Ok(Self {
            timeout,
            current: TransIdentity::decode(r)?,
            parents: r.read_seq()?,
            implementation_specific_data: AnyValue::decode(r)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::cdr::{from_encapsulation, to_encapsulation};

    fn coordinator() -> ObjectRef {
        ObjectRef::new(
            "IDL:omg.org/CosTransactions/Coordinator:1.0",
            vec![TaggedProfile {
                tag: 0,
                profile_data: vec![1, 2, 3, 4],
            }],
        )
    }

    fn real_context() -> PropagationContext {
        PropagationContext {
            timeout: 300,
            current: TransIdentity {
                coord: Some(coordinator()),
                term: None,
                otid: Otid {
                    format_id: 0x4a54_5320,
                    bqual_length: 4,
                    tid: vec![9; 12],
                },
            },
            parents: Vec::new(),
            implementation_specific_data: AnyValue::Null,
        }
    }

    // ---- Sentinels ----

    #[test]
    fn dummy_is_dummy_and_null() {
        let ctx = PropagationContext::dummy();
        assert!(ctx.is_dummy());
        assert!(ctx.is_null());
    }

    #[test]
    fn null_is_null_but_not_dummy() {
        let ctx = PropagationContext::null();
        assert!(ctx.is_null());
        assert!(!ctx.is_dummy());
    }

    #[test]
    fn real_context_is_neither() {
        let ctx = real_context();
        assert!(!ctx.is_null());
        assert!(!ctx.is_dummy());
    }

    #[test]
    fn terminator_only_is_not_null() {
        let mut ctx = PropagationContext::null();
        ctx.current.term = Some(coordinator());
        assert!(!ctx.is_null());
    }

    #[test]
    fn non_boolean_payload_is_never_dummy() {
        let mut ctx = PropagationContext::dummy();
        ctx.implementation_specific_data = AnyValue::Short(1);
        assert!(!ctx.is_dummy());
        assert!(ctx.is_null());
    }

    #[test]
    fn dummy_requires_sentinel_timeout() {
        let mut ctx = PropagationContext::dummy();
        ctx.timeout = 0;
        assert!(!ctx.is_dummy());
    }

    // ---- Wire ----

    #[test]
    fn dummy_timeout_survives_unsigned_encoding() {
        let bytes = to_encapsulation(&PropagationContext::dummy());
        assert_eq!(&bytes[4..8], &[0xff, 0xff, 0xff, 0xff]);
        let decoded: PropagationContext = from_encapsulation(&bytes).unwrap();
        assert!(decoded.is_dummy());
    }

    #[test]
    fn nil_reference_decodes_as_none() {
        let decoded: PropagationContext =
            from_encapsulation(&to_encapsulation(&PropagationContext::null())).unwrap();
        assert!(decoded.current.coord.is_none());
        assert!(decoded.current.term.is_none());
    }

    #[test]
    fn unsupported_any_kind_is_rejected() {
        let mut w = CdrWriter::new();
        // tk_objref
        w.write_ulong(14);
        assert!(from_encapsulation::<AnyValue>(&w.into_bytes()).is_err());
    }

    #[test]
    fn context_serializes_to_json() {
        let json = serde_json::to_value(real_context()).unwrap();
        assert_eq!(json["timeout"], 300);
        assert_eq!(
            json["current"]["coord"]["type_id"],
            "IDL:omg.org/CosTransactions/Coordinator:1.0"
        );
    }

    // ---- Properties ----

    fn arb_object_ref() -> impl Strategy<Value = Option<ObjectRef>> {
        proptest::option::of(
            (
                "IDL:[a-zA-Z/]{1,24}:1\\.0",
                proptest::collection::vec(
                    (any::<u32>(), proptest::collection::vec(any::<u8>(), 0..16))
                        .prop_map(|(tag, profile_data)| TaggedProfile { tag, profile_data }),
                    0..3,
                ),
            )
                .prop_map(|(type_id, profiles)| ObjectRef { type_id, profiles }),
        )
    }

    fn arb_identity() -> impl Strategy<Value = TransIdentity> {
        (
            arb_object_ref(),
            arb_object_ref(),
            any::<i32>(),
            any::<i32>(),
            proptest::collection::vec(any::<u8>(), 0..32),
        )
            .prop_map(|(coord, term, format_id, bqual_length, tid)| TransIdentity {
                coord,
                term,
                otid: Otid {
                    format_id,
                    bqual_length,
                    tid,
                },
            })
    }

    fn arb_any() -> impl Strategy<Value = AnyValue> {
        prop_oneof![
            Just(AnyValue::Null),
            Just(AnyValue::Void),
            any::<bool>().prop_map(AnyValue::Boolean),
            any::<i16>().prop_map(AnyValue::Short),
            any::<i32>().prop_map(AnyValue::Long),
            "[a-z ]{0,16}".prop_map(AnyValue::String),
        ]
    }

    proptest! {
        #[test]
        fn context_survives_encapsulation(
            timeout in any::<i32>(),
            current in arb_identity(),
            parents in proptest::collection::vec(arb_identity(), 0..3),
            data in arb_any(),
        ) {
            let ctx = PropagationContext {
                timeout,
                current,
                parents,
                implementation_specific_data: data,
            };
            let decoded: PropagationContext =
                from_encapsulation(&to_encapsulation(&ctx)).unwrap();
            prop_assert_eq!(decoded, ctx);
        }
    }
}
