pub mod handlers;
pub mod history;
pub mod reply;
pub mod repository;
pub mod session;
pub mod state;
pub mod tree;
pub mod workflow;
