pub mod chaos;
pub mod fixtures;

// Each integration binary compiles its own copy of this module and not all
// of them touch both halves.
#[allow(unused_imports)]
pub use chaos::*;
#[allow(unused_imports)]
pub use fixtures::*;
