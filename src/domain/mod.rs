//! Database domain layer

pub mod scheduled_posts;
