pub mod meeting_handler;
pub mod room_handler;
pub mod schedule_handler;
