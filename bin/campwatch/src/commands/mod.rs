pub mod doctor;
pub mod watch;
