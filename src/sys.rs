pub mod bridge;
pub mod geometry;
pub mod hotkey;
pub mod observer;
pub mod process;
pub mod screen;
