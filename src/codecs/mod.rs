//! Text pre-processing leaves
//!
//! whiteSpace handling plus the lexical codecs for durations and
//! date/time values used by the built-in bindings.

pub mod datetime;
pub mod duration;
pub mod whitespace;

pub use datetime::{XsDate, XsDateTime, XsTime};
pub use duration::Duration;
pub use whitespace::{split_list, WhiteSpace};
