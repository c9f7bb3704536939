pub mod paper;
pub mod user;

pub use paper::*;
pub use user::*;
