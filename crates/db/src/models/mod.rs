pub mod notification;
pub mod presence;
pub mod project;
