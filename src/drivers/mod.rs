//! GPIO helpers and the pulse indicator driver.

pub mod hw_init;
pub mod indicator;
