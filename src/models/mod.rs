pub mod pov;
pub mod user;
