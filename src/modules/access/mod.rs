pub mod controller;
pub mod resolver;
pub mod router;
pub mod service;
