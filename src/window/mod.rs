pub mod client;
pub mod layout;
pub mod manager;
pub mod registry;
pub mod status;
