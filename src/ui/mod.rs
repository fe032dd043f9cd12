pub mod player;
pub mod render;
pub mod ui;
