use uuid::Uuid;

pub mod events;
pub mod jwt;
pub mod participants;
pub mod users;

/// A type alias that represents any Entity's internal id field data type.
///
/// Ids are opaque strings. New ids are UUIDv7 values, whose hyphenated form sorts
/// lexicographically in creation order.
pub type Id = String;

/// Issues a new time-ordered id.
pub fn new_id() -> Id {
    Uuid::now_v7().to_string()
}
