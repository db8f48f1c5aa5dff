pub mod export;
pub mod list;
pub mod question;
pub mod render;
pub mod report;
