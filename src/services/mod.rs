pub mod contributions;
pub mod moderation;
pub mod votes;
