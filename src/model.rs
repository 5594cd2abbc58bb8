pub mod object;
pub mod transfer;
