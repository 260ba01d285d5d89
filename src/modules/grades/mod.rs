pub mod aggregation;
pub mod controller;
pub mod router;
pub mod service;
