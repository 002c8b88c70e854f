// Command handlers module
pub mod gpu;
pub mod settings;
pub mod watch;

// Re-exports for cleaner imports
pub use gpu::execute as gpu;
pub use settings::handle_settings;
pub use watch::execute as watch;
