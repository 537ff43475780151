pub mod eye_tracking;

pub use eye_tracking::*;
