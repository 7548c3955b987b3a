//! `std_msgs` scalar messages

use super::{fixed, CodecError, WireMessage};

/// `std_msgs/Float64`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Float64 {
    pub data: f64,
}

/// `std_msgs/Float32`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Float32 {
    pub data: f32,
}

/// `std_msgs/Int32`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Int32 {
    pub data: i32,
}

/// `std_msgs/Int64`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Int64 {
    pub data: i64,
}

/// `std_msgs/Bool`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bool {
    pub data: bool,
}

/// `std_msgs/String`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringMessage {
    pub data: String,
}

macro_rules! scalar_message {
    ($msg:ident, $native:ty, $type_name:literal) => {
        impl WireMessage for $msg {
            const TYPE_NAME: &'static str = $type_name;

            fn encode(&self) -> Vec<u8> {
                self.data.to_le_bytes().to_vec()
            }

            fn decode(payload: &[u8]) -> Result<Self, CodecError> {
                let bytes = fixed(Self::TYPE_NAME, payload)?;
                Ok(Self {
                    data: <$native>::from_le_bytes(bytes),
                })
            }
        }

        impl From<$native> for $msg {
            fn from(data: $native) -> Self {
                Self { data }
            }
        }

        impl From<$msg> for $native {
            fn from(msg: $msg) -> Self {
                msg.data
            }
        }
    };
}

scalar_message!(Float64, f64, "std_msgs/Float64");
scalar_message!(Float32, f32, "std_msgs/Float32");
scalar_message!(Int32, i32, "std_msgs/Int32");
scalar_message!(Int64, i64, "std_msgs/Int64");

impl WireMessage for Bool {
    const TYPE_NAME: &'static str = "std_msgs/Bool";

    fn encode(&self) -> Vec<u8> {
        vec![u8::from(self.data)]
    }

    fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let [byte] = fixed::<1>(Self::TYPE_NAME, payload)?;
        match byte {
            0 => Ok(Self { data: false }),
            1 => Ok(Self { data: true }),
            other => Err(CodecError::InvalidBool(other)),
        }
    }
}

impl From<bool> for Bool {
    fn from(data: bool) -> Self {
        Self { data }
    }
}

impl From<Bool> for bool {
    fn from(msg: Bool) -> Self {
        msg.data
    }
}

impl WireMessage for StringMessage {
    const TYPE_NAME: &'static str = "std_msgs/String";

    fn encode(&self) -> Vec<u8> {
        let bytes = self.data.as_bytes();
        let mut out = Vec::with_capacity(4 + bytes.len());
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(bytes);
        out
    }

    fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        if payload.len() < 4 {
            return Err(CodecError::Length {
                type_name: Self::TYPE_NAME,
                expected: 4,
                actual: payload.len(),
            });
        }
        let (prefix, body) = payload.split_at(4);
        let len = u32::from_le_bytes(fixed(Self::TYPE_NAME, prefix)?) as usize;
        if body.len() != len {
            return Err(CodecError::Length {
                type_name: Self::TYPE_NAME,
                expected: 4 + len,
                actual: payload.len(),
            });
        }
        let data = String::from_utf8(body.to_vec()).map_err(|_| CodecError::Utf8)?;
        Ok(Self { data })
    }
}

impl From<String> for StringMessage {
    fn from(data: String) -> Self {
        Self { data }
    }
}

impl From<StringMessage> for String {
    fn from(msg: StringMessage) -> Self {
        msg.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float64_layout_is_little_endian() {
        let msg = Float64::from(1.0);
        assert_eq!(msg.encode(), vec![0, 0, 0, 0, 0, 0, 0xf0, 0x3f]);
    }

    #[test]
    fn test_float64_preserves_bits() {
        let values = [
            0.0,
            -0.0,
            f64::MIN_POSITIVE,
            f64::MAX,
            f64::MIN,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::from_bits(0x7ff8_0000_dead_beef),
            5e-324,
        ];

        for v in values {
            let decoded = Float64::decode(&Float64::from(v).encode()).unwrap();
            assert_eq!(decoded.data.to_bits(), v.to_bits(), "value {:e}", v);
        }
    }

    #[test]
    fn test_float64_wrong_length() {
        let err = Float64::decode(&[0, 0, 0, 0]).unwrap_err();
        assert_eq!(
            err,
            CodecError::Length {
                type_name: "std_msgs/Float64",
                expected: 8,
                actual: 4,
            }
        );
    }

    #[test]
    fn test_int32_negative() {
        let bytes = Int32::from(-2).encode();
        assert_eq!(bytes, vec![0xfe, 0xff, 0xff, 0xff]);
        assert_eq!(i32::from(Int32::decode(&bytes).unwrap()), -2);
    }

    #[test]
    fn test_bool_rejects_other_bytes() {
        assert!(Bool::decode(&[1]).unwrap().data);
        assert!(!Bool::decode(&[0]).unwrap().data);
        assert_eq!(Bool::decode(&[7]).unwrap_err(), CodecError::InvalidBool(7));
        assert!(Bool::decode(&[]).is_err());
    }

    #[test]
    fn test_string_length_prefix() {
        let bytes = StringMessage::from("ok".to_string()).encode();
        assert_eq!(bytes, vec![2, 0, 0, 0, b'o', b'k']);
        assert_eq!(StringMessage::decode(&bytes).unwrap().data, "ok");
    }

    #[test]
    fn test_string_truncated_body() {
        let err = StringMessage::decode(&[5, 0, 0, 0, b'a']).unwrap_err();
        assert!(matches!(err, CodecError::Length { expected: 9, .. }));
    }

    #[test]
    fn test_string_invalid_utf8() {
        let err = StringMessage::decode(&[2, 0, 0, 0, 0xc3, 0x28]).unwrap_err();
        assert_eq!(err, CodecError::Utf8);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Float64::TYPE_NAME, "std_msgs/Float64");
        assert_eq!(Float32::TYPE_NAME, "std_msgs/Float32");
        assert_eq!(Int64::TYPE_NAME, "std_msgs/Int64");
        assert_eq!(StringMessage::TYPE_NAME, "std_msgs/String");
    }
}
