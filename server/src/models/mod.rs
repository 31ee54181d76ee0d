pub mod generation_model;
pub mod instructor_model;
pub mod meeting_model;
pub mod room_model;
pub mod schedule_model;
pub mod section_model;
pub mod subject_model;
