pub mod state;
pub mod time;
pub mod utils;
