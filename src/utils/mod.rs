//! Utilities (Unicode helpers).

pub mod unicode;
