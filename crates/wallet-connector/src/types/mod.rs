pub mod address;
pub mod network;
