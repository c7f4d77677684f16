pub mod location;
pub mod notification;
pub mod package;
pub mod route;
pub mod user;
