//! Element value types for arrays and property values.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Declared element type of a data array or property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Bool,
    Float,
    Double,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    String,
    Date,
    DateTime,
}

impl DataType {
    /// Fixed element width in bytes; `None` for variable-length types.
    pub fn size_in_bytes(self) -> Option<usize> {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Float | Self::Int32 | Self::UInt32 => Some(4),
            Self::Double | Self::Int64 | Self::UInt64 => Some(8),
            Self::String | Self::Date | Self::DateTime => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            Self::Bool | Self::String | Self::Date | Self::DateTime
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Float => "float",
            Self::Double => "double",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::String => "string",
            Self::Date => "date",
            Self::DateTime => "date_time",
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Variant {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(String),
}

impl Variant {
    /// The widest data type this value naturally maps to.
    pub fn natural_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Bool,
            Self::Int(_) => DataType::Int64,
            Self::UInt(_) => DataType::UInt64,
            Self::Double(_) => DataType::Double,
            Self::String(_) => DataType::String,
        }
    }

    /// Whether this value can be stored under `data_type` without loss.
    pub fn fits(&self, data_type: DataType) -> bool {
        match (self, data_type) {
            (Self::Bool(_), DataType::Bool) => true,
            (Self::Int(value), DataType::Int8) => i8::try_from(*value).is_ok(),
            (Self::Int(value), DataType::Int16) => i16::try_from(*value).is_ok(),
            (Self::Int(value), DataType::Int32) => i32::try_from(*value).is_ok(),
            (Self::Int(_), DataType::Int64) => true,
            (Self::UInt(value), DataType::UInt8) => u8::try_from(*value).is_ok(),
            (Self::UInt(value), DataType::UInt16) => u16::try_from(*value).is_ok(),
            (Self::UInt(value), DataType::UInt32) => u32::try_from(*value).is_ok(),
            (Self::UInt(_), DataType::UInt64) => true,
            (Self::Double(_), DataType::Float | DataType::Double) => true,
            (Self::String(_), DataType::String | DataType::Date | DataType::DateTime) => true,
            _ => false,
        }
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for Variant {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{DataType, Variant};

    #[test]
    fn integer_fit_respects_width() {
        assert!(Variant::Int(127).fits(DataType::Int8));
        assert!(!Variant::Int(128).fits(DataType::Int8));
        assert!(!Variant::Int(1).fits(DataType::UInt8));
        assert!(Variant::UInt(65_535).fits(DataType::UInt16));
    }

    #[test]
    fn strings_fit_date_types() {
        assert!(Variant::from("2024-01-01").fits(DataType::Date));
        assert!(!Variant::from("x").fits(DataType::Double));
    }

    #[test]
    fn sizes_follow_type_width() {
        assert_eq!(DataType::Double.size_in_bytes(), Some(8));
        assert_eq!(DataType::Int16.size_in_bytes(), Some(2));
        assert_eq!(DataType::String.size_in_bytes(), None);
    }
}
