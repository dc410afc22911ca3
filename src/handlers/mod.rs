pub mod customer;
pub mod reservation;
pub mod table;

use serde::{Deserialize, Deserializer};

/// Deserializer for nullable patch fields. Pair with
/// `#[serde(default, deserialize_with = "double_option")]`: an absent field
/// stays `None` (leave as-is), an explicit `null` becomes `Some(None)`
/// (clear), and a value becomes `Some(Some(v))`.
pub fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}
