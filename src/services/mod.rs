pub mod checkin;
pub mod dashboard;
pub mod program_generator;
