pub mod bot;
pub mod workflow;
