pub mod collection;
pub mod record;

pub use collection::*;
pub use record::*;
