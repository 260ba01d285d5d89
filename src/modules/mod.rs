pub mod access;
pub mod audit;
pub mod grades;
pub mod schedules;
