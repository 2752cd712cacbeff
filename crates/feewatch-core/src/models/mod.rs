//! Data models for feewatch

mod alert;
mod decision;
mod history;
mod sample;

pub use alert::*;
pub use decision::*;
pub use history::*;
pub use sample::*;
