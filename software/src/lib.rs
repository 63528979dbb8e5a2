pub mod api;
pub mod blink;
pub mod config;
pub mod controller;
pub mod drivers;
