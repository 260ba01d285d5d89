pub mod controller;
pub mod recorder;
pub mod router;
