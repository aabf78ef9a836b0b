pub mod layout;
pub mod lock;
pub mod registry;
pub mod status;
