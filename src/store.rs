mod loose;
mod refs;

pub use loose::ObjectStore;
pub use refs::{Head, RefStore};
