// Domain layer - Readings, devices and aligned chart data
pub mod alignment;
pub mod device;
pub mod error;
pub mod sample;
