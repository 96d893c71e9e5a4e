pub mod game;
pub mod management;
