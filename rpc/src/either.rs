//! Wire fields that hold exactly one of two shapes.
//!
//! Serialized as whichever branch is populated, with no tag. Deserialization
//! buffers the JSON value and tries `L`, then `R`, returning the first that
//! parses. Give the two shapes at least one distinct required field, otherwise
//! everything lands in `L`.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Either<L, R> {
    Left(L),
    Right(R),
}

impl<L, R> Either<L, R> {
    #[must_use]
    pub fn left(&self) -> Option<&L> {
        match self {
            Self::Left(l) => Some(l),
            Self::Right(_) => None,
        }
    }

    #[must_use]
    pub fn right(&self) -> Option<&R> {
        match self {
            Self::Left(_) => None,
            Self::Right(r) => Some(r),
        }
    }

    #[must_use]
    pub const fn is_left(&self) -> bool {
        matches!(self, Self::Left(_))
    }

    pub fn map_either<T>(self, left: impl FnOnce(L) -> T, right: impl FnOnce(R) -> T) -> T {
        match self {
            Self::Left(l) => left(l),
            Self::Right(r) => right(r),
        }
    }
}

impl<L: Serialize, R: Serialize> Serialize for Either<L, R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Left(l) => l.serialize(serializer),
            Self::Right(r) => r.serialize(serializer),
        }
    }
}

impl<'de, L: DeserializeOwned, R: DeserializeOwned> Deserialize<'de> for Either<L, R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let left_err = match serde_json::from_value::<L>(value.clone()) {
            Ok(l) => return Ok(Self::Left(l)),
            Err(e) => e,
        };
        match serde_json::from_value::<R>(value) {
            Ok(r) => Ok(Self::Right(r)),
            Err(right_err) => Err(D::Error::custom(format!(
                "value matches neither {} ({left_err}) nor {} ({right_err})",
                short_type_name::<L>(),
                short_type_name::<R>(),
            ))),
        }
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
