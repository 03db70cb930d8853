pub mod account;
pub mod contact;
pub mod conversation;
pub mod message;
pub mod notification;
