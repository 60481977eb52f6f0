pub mod capture;
pub mod dataset;
pub mod errors;
pub mod events;
pub mod grid;
pub mod ids;
pub mod provider;
pub mod tools;
