pub mod copy;
pub mod locator;
pub mod poll;
pub mod stream;
