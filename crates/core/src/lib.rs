#![forbid(unsafe_code)]

pub mod answer;
pub mod csv;
pub mod error;
pub mod hint;
pub mod model;
pub mod time;

pub use error::Error;
pub use time::Clock;
