pub mod lead;
pub mod message;
pub mod session;
pub mod slots;
pub mod tenant;
