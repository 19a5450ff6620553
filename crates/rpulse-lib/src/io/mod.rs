pub mod text;
pub mod ticks;
