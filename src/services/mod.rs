pub mod audit;
pub mod clock;
pub mod conversation;
pub mod identity;
pub mod parser;
pub mod scheduling;
