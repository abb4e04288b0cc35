mod midi;
mod order;

pub use midi::*;
pub use order::*;
