pub mod email;
pub mod events;
pub mod generator;
pub mod lock;
pub mod password;
pub mod token;
