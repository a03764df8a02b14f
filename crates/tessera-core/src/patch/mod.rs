//! Patch algebra: identity-keyed ordered lists, keyed maps, and the single
//! reconciliation point that decides how a payload lands on a current value.

mod error;
mod list;
mod map;
mod reconcile;

pub use error::PatchError;
pub use list::{ListChange, OrderedPatchList, Position};
pub use map::{KeyedPatchMap, MapChange};
pub use reconcile::reconcile;
