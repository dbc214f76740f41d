pub mod error;
pub mod health;
pub mod openapi;
pub mod posture;
pub mod threads;
