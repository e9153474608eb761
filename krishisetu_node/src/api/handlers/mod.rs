pub mod blockchain;
pub mod status;
