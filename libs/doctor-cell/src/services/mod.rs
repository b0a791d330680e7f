pub mod doctor;
pub mod schedule;
pub mod slots;
