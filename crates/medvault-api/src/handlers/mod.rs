pub mod health;
pub mod objects;
pub mod uploads;
