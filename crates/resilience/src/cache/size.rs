//! Deterministic size estimation for cached values
//!
//! The memory ceiling needs a cheap, stable estimate of what a value costs
//! to keep resident. Estimates are approximate by design: scalars cost a
//! flat constant, strings cost two bytes per character, and aggregates sum
//! their parts recursively. Opaque types fall back to their serialized JSON
//! length via [`estimate_serialized`].

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

/// Flat cost charged for scalar values and per-element bookkeeping.
pub const SCALAR_COST: usize = 8;

/// Approximate in-memory cost of a value, in bytes.
///
/// Used only to enforce the cache memory ceiling; never for correctness.
pub trait EstimateSize {
    /// Estimated cost of this value in bytes.
    fn estimate_bytes(&self) -> usize;
}

macro_rules! impl_scalar_estimate {
    ($($ty:ty),* $(,)?) => {
        $(
            impl EstimateSize for $ty {
                fn estimate_bytes(&self) -> usize {
                    SCALAR_COST
                }
            }
        )*
    };
}

impl_scalar_estimate!(bool, char, i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, usize, isize, f32, f64, ());

impl EstimateSize for String {
    fn estimate_bytes(&self) -> usize {
        self.chars().count() * 2 + SCALAR_COST
    }
}

impl EstimateSize for &str {
    fn estimate_bytes(&self) -> usize {
        self.chars().count() * 2 + SCALAR_COST
    }
}

impl<T: EstimateSize> EstimateSize for Option<T> {
    fn estimate_bytes(&self) -> usize {
        match self {
            Some(value) => value.estimate_bytes() + SCALAR_COST,
            None => SCALAR_COST,
        }
    }
}

impl<T: EstimateSize> EstimateSize for Vec<T> {
    fn estimate_bytes(&self) -> usize {
        self.iter().map(|v| v.estimate_bytes() + SCALAR_COST).sum::<usize>() + SCALAR_COST
    }
}

impl<K, V: EstimateSize> EstimateSize for HashMap<K, V>
where
    K: AsRef<str>,
{
    fn estimate_bytes(&self) -> usize {
        self.iter()
            .map(|(k, v)| k.as_ref().estimate_bytes() + v.estimate_bytes())
            .sum::<usize>()
            + SCALAR_COST
    }
}

impl<K, V: EstimateSize> EstimateSize for BTreeMap<K, V>
where
    K: AsRef<str>,
{
    fn estimate_bytes(&self) -> usize {
        self.iter()
            .map(|(k, v)| k.as_ref().estimate_bytes() + v.estimate_bytes())
            .sum::<usize>()
            + SCALAR_COST
    }
}

impl EstimateSize for serde_json::Value {
    fn estimate_bytes(&self) -> usize {
        match self {
            serde_json::Value::Null
            | serde_json::Value::Bool(_)
            | serde_json::Value::Number(_) => SCALAR_COST,
            serde_json::Value::String(s) => s.chars().count() * 2 + SCALAR_COST,
            serde_json::Value::Array(items) => {
                items.iter().map(|v| v.estimate_bytes() + SCALAR_COST).sum::<usize>() + SCALAR_COST
            }
            serde_json::Value::Object(map) => {
                map.iter()
                    .map(|(k, v)| k.chars().count() * 2 + SCALAR_COST + v.estimate_bytes())
                    .sum::<usize>()
                    + SCALAR_COST
            }
        }
    }
}

/// Serialized-length fallback for types without a structural estimate.
///
/// Values that fail to serialize are charged the scalar constant; the
/// estimate must never turn into an error path.
pub fn estimate_serialized<T: Serialize>(value: &T) -> usize {
    serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(SCALAR_COST)
}
