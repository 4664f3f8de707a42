pub mod dispatcher;
pub mod models;
pub mod senders;
pub mod template;
