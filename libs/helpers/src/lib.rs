pub mod collection;
pub mod runs;
