pub mod cluster;
pub mod health;
pub mod models;
pub mod workers;
