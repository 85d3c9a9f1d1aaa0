// Application layer - Use cases over the sample source
pub mod aligner;
pub mod assembler;
pub mod device_service;
pub mod fetch_coordinator;
pub mod multidevice_service;
pub mod sample_source;
