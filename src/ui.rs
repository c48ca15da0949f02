pub mod border;
pub mod dimmer;
