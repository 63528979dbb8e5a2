pub mod hal;
pub mod header;
pub mod protocol;
