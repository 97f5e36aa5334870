pub mod application;
pub mod cv;
pub mod job_listing;

use serde::{Deserialize, Deserializer};

/// Patch field for a nullable column: absent stays `None`, an explicit `null`
/// becomes `Some(None)` and clears the column. Pair with `#[serde(default)]`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
