//! Function ID new-type with validation for `pg_proc` object identifiers.
//!
//! PostgreSQL identifies every function overload by its `oid`. The catalog queries cast it to
//! `int8`, so the identifier is carried as a positive `i64`.

use sqlx::{Database, Postgres, encode::IsNull, error::BoxDynError};

/// A type-safe identifier for one function overload.
///
/// [`FunctionId`] is a new-type wrapper around `i64` that enforces the following invariants:
/// - Values must be positive (> 0)
/// - Values must fit within the range of an `oid` (`u32`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(i64);

impl From<u32> for FunctionId {
    fn from(oid: u32) -> Self {
        Self(i64::from(oid))
    }
}

impl TryFrom<i64> for FunctionId {
    type Error = FunctionIdI64ConvError;

    /// Attempts to convert an `i64` to a [`FunctionId`] with validation.
    ///
    /// # Errors
    ///
    /// - `FunctionIdI64ConvError::NonPositive` if the value is zero or negative
    /// - `FunctionIdI64ConvError::Overflow` if the value does not fit in an `oid`
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value <= 0 {
            Err(FunctionIdI64ConvError::NonPositive(value))
        } else if value > i64::from(u32::MAX) {
            Err(FunctionIdI64ConvError::Overflow(value))
        } else {
            Ok(Self(value))
        }
    }
}

impl std::ops::Deref for FunctionId {
    type Target = i64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::str::FromStr for FunctionId {
    type Err = FunctionIdFromStrError;

    /// Parses a string as a [`FunctionId`].
    ///
    /// # Errors
    ///
    /// - `FunctionIdFromStrError::ParseError` if the string is not a valid `i64`
    /// - `FunctionIdFromStrError::OutOfRange` if the parsed value is not a valid `oid`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .parse::<i64>()
            .map_err(FunctionIdFromStrError::ParseError)?;
        id.try_into().map_err(FunctionIdFromStrError::OutOfRange)
    }
}

impl std::fmt::Display for FunctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl sqlx::Type<Postgres> for FunctionId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, Postgres> for FunctionId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let id = <i64 as sqlx::Decode<Postgres>>::decode(value)?;
        id.try_into().map_err(|err| Box::new(err) as BoxDynError)
    }
}

impl<'q> sqlx::Encode<'q, Postgres> for FunctionId {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        <i64 as sqlx::Encode<'q, Postgres>>::encode_by_ref(&self.0, buf)
    }
}

impl serde::Serialize for FunctionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for FunctionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = i64::deserialize(deserializer)?;
        id.try_into().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when converting from `i64` to [`FunctionId`].
#[derive(Debug, thiserror::Error)]
pub enum FunctionIdI64ConvError {
    /// The provided value is zero or negative.
    #[error("FunctionId must be positive, got: {0}")]
    NonPositive(i64),
    /// The provided value is larger than the largest `oid`.
    #[error("Value {0} exceeds the oid range")]
    Overflow(i64),
}

/// Errors that can occur when parsing a string as a [`FunctionId`].
#[derive(Debug, thiserror::Error)]
pub enum FunctionIdFromStrError {
    /// The string is not a valid `i64`.
    #[error("Invalid number format: {0}")]
    ParseError(#[source] std::num::ParseIntError),
    /// The parsed value is not a valid `oid`.
    #[error(transparent)]
    OutOfRange(FunctionIdI64ConvError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_from_accepts_oid_range_only() {
        assert!(FunctionId::try_from(16384_i64).is_ok());
        assert!(matches!(
            FunctionId::try_from(0_i64),
            Err(FunctionIdI64ConvError::NonPositive(0))
        ));
        assert!(matches!(
            FunctionId::try_from(i64::from(u32::MAX) + 1),
            Err(FunctionIdI64ConvError::Overflow(_))
        ));
    }

    #[test]
    fn from_str_parses_and_validates() {
        //* When
        let parsed: FunctionId = "42".parse().expect("valid id");

        //* Then
        assert_eq!(*parsed, 42);
        assert!("abc".parse::<FunctionId>().is_err());
        assert!("-1".parse::<FunctionId>().is_err());
    }

    #[test]
    fn serde_round_trips_as_a_plain_number() {
        //* Given
        let id = FunctionId::from(16385_u32);

        //* When
        let json = serde_json::to_string(&id).expect("serialize");
        let back: FunctionId = serde_json::from_str(&json).expect("deserialize");

        //* Then
        assert_eq!(json, "16385");
        assert_eq!(back, id);
    }
}
