pub mod demo;
pub mod plugins;
