pub mod commands;
pub mod data;
pub mod settings;
pub mod status;
