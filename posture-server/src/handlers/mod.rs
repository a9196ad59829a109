pub mod exceptions;
pub mod health;
pub mod observations;
pub mod scan;
