pub mod controller;
pub mod detector;
pub mod router;
pub mod service;
