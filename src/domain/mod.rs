pub mod activity;
pub mod models;
pub mod session;
pub mod settings;
