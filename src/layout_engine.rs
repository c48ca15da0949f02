pub mod engine;

pub use engine::{
    master_stack_frames, neighbor_in_direction, scrolling_frames, window_at_point, ColumnFrames,
    Direction, Gaps, OrderTarget,
};
