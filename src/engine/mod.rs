pub mod filter;
pub mod route;
pub mod tracking;
