pub mod chat;
pub mod export;
pub mod health;
