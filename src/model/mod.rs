//! Shadow model: entity kinds, attribute values and staging records.

pub mod kind;
pub mod net;
pub mod shadow;
pub mod value;

pub use kind::{EntityKind, OnDelete, Reference};
pub use net::{NetAddress, NetAddressError};
pub use shadow::{Shadow, ShadowKey};
pub use value::{RowId, Value};
