pub mod checkin;
pub mod intensity;
pub mod profile;
pub mod program;
pub mod risk;
