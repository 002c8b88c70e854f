// Platform-specific code module

pub mod command;
pub mod gpu;
pub mod ram;

pub use gpu::SystemGpuProbe;
pub use ram::fetch_ram_speed;
