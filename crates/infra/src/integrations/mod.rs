//! External service integrations

pub mod crm;
