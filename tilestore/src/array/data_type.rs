//! Element data types.

use serde::{Deserialize, Serialize};

/// The element type of an attribute or dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
#[display(rename_all = "lowercase")]
pub enum DataType {
    /// `i8`
    Int8,
    /// `i16`
    Int16,
    /// `i32`
    Int32,
    /// `i64`
    Int64,
    /// `u8`
    UInt8,
    /// `u16`
    UInt16,
    /// `u32`
    UInt32,
    /// `u64`
    UInt64,
    /// `f32`
    Float32,
    /// `f64`
    Float64,
    /// A single byte character, typically used with variable length attributes to hold strings.
    Char,
}

impl DataType {
    /// The size of one element in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 | Self::Char => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Returns true if the data type can be used for dimension coordinates.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        !matches!(self, Self::Float32 | Self::Float64 | Self::Char)
    }

    /// The inclusive range of coordinate values representable by an integer data type, clamped to [`i64`].
    #[must_use]
    pub const fn coordinate_range(self) -> Option<[i64; 2]> {
        match self {
            Self::Int8 => Some([i8::MIN as i64, i8::MAX as i64]),
            Self::Int16 => Some([i16::MIN as i64, i16::MAX as i64]),
            Self::Int32 => Some([i32::MIN as i64, i32::MAX as i64]),
            Self::Int64 => Some([i64::MIN, i64::MAX]),
            Self::UInt8 => Some([0, u8::MAX as i64]),
            Self::UInt16 => Some([0, u16::MAX as i64]),
            Self::UInt32 => Some([0, u32::MAX as i64]),
            Self::UInt64 => Some([0, i64::MAX]),
            Self::Float32 | Self::Float64 | Self::Char => None,
        }
    }

    /// Decode one native endian coordinate of this data type.
    ///
    /// Returns [`None`] if the data type is not an integer, `bytes` is not exactly [`size`](Self::size) bytes, or the value does not fit in [`i64`].
    #[must_use]
    pub fn decode_coordinate(self, bytes: &[u8]) -> Option<i64> {
        match self {
            Self::Int8 => Some(i64::from(i8::from_ne_bytes(bytes.try_into().ok()?))),
            Self::Int16 => Some(i64::from(i16::from_ne_bytes(bytes.try_into().ok()?))),
            Self::Int32 => Some(i64::from(i32::from_ne_bytes(bytes.try_into().ok()?))),
            Self::Int64 => Some(i64::from_ne_bytes(bytes.try_into().ok()?)),
            Self::UInt8 => Some(i64::from(u8::from_ne_bytes(bytes.try_into().ok()?))),
            Self::UInt16 => Some(i64::from(u16::from_ne_bytes(bytes.try_into().ok()?))),
            Self::UInt32 => Some(i64::from(u32::from_ne_bytes(bytes.try_into().ok()?))),
            Self::UInt64 => i64::try_from(u64::from_ne_bytes(bytes.try_into().ok()?)).ok(),
            Self::Float32 | Self::Float64 | Self::Char => None,
        }
    }

    /// Append `value` as one native endian coordinate of this data type.
    ///
    /// Returns [`None`] if the data type is not an integer or `value` is not representable.
    pub fn encode_coordinate(self, value: i64, bytes: &mut Vec<u8>) -> Option<()> {
        match self {
            Self::Int8 => bytes.extend_from_slice(&i8::try_from(value).ok()?.to_ne_bytes()),
            Self::Int16 => bytes.extend_from_slice(&i16::try_from(value).ok()?.to_ne_bytes()),
            Self::Int32 => bytes.extend_from_slice(&i32::try_from(value).ok()?.to_ne_bytes()),
            Self::Int64 => bytes.extend_from_slice(&value.to_ne_bytes()),
            Self::UInt8 => bytes.extend_from_slice(&u8::try_from(value).ok()?.to_ne_bytes()),
            Self::UInt16 => bytes.extend_from_slice(&u16::try_from(value).ok()?.to_ne_bytes()),
            Self::UInt32 => bytes.extend_from_slice(&u32::try_from(value).ok()?.to_ne_bytes()),
            Self::UInt64 => bytes.extend_from_slice(&u64::try_from(value).ok()?.to_ne_bytes()),
            Self::Float32 | Self::Float64 | Self::Char => return None,
        }
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_coordinates() {
        let mut bytes = Vec::new();
        DataType::Int16.encode_coordinate(-3, &mut bytes).unwrap();
        assert_eq!(bytes.len(), 2);
        assert_eq!(DataType::Int16.decode_coordinate(&bytes), Some(-3));
        assert!(DataType::UInt8.encode_coordinate(-1, &mut bytes).is_none());
        assert!(DataType::Float64.encode_coordinate(1, &mut bytes).is_none());
        assert_eq!(DataType::UInt64.decode_coordinate(&u64::MAX.to_ne_bytes()), None);
        assert_eq!(DataType::Int32.decode_coordinate(&[0, 0]), None);
    }

    #[test]
    fn data_type_serde() {
        assert_eq!(serde_json::to_string(&DataType::UInt16).unwrap(), r#""uint16""#);
        assert_eq!(
            serde_json::from_str::<DataType>(r#""float64""#).unwrap(),
            DataType::Float64
        );
        assert_eq!(DataType::Char.to_string(), "char");
        assert_eq!(DataType::Char.coordinate_range(), None);
        assert_eq!(DataType::UInt8.coordinate_range(), Some([0, 255]));
    }
}
