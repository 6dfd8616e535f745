pub mod assistants;
pub mod availability;
pub mod bookings;
pub mod business;
pub mod catalog;
pub mod core;
pub mod email;
pub mod main_module;
pub mod voice;
