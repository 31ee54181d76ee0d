use crate::controllers::{meeting_handler, room_handler, schedule_handler};
use crate::models::generation_model::{CourseRow, GenerateRequest, GenerateResponse, GenerateStats};
use crate::models::meeting_model::{
    ConflictClusterDto, ConflictReportResponse, EditDetails, SuggestForm, SuggestResponse,
    SuggestionDto, UpdateMeetingForm, UpdateMeetingResponse, ValidateEditForm,
    ValidateEditResponse,
};
use crate::models::room_model::{CreateRoomsForm, Room, RoomError};
use crate::models::schedule_model::{
    EntryWithMeetings, ScheduleEntry, ScheduleError, ScheduleGroup, ScheduleMeeting,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        schedule_handler::generate,
        schedule_handler::groups,
        schedule_handler::get_group,
        schedule_handler::delete_group,
        schedule_handler::conflicts,
        meeting_handler::validate_edit,
        meeting_handler::update_meeting,
        meeting_handler::suggest,
        room_handler::rooms,
        room_handler::post_rooms,
        room_handler::put_room,
        room_handler::delete_room,
    ),
    components(
        schemas(
            CourseRow,
            GenerateRequest,
            GenerateResponse,
            GenerateStats,
            ValidateEditForm,
            ValidateEditResponse,
            EditDetails,
            UpdateMeetingForm,
            UpdateMeetingResponse,
            SuggestForm,
            SuggestResponse,
            SuggestionDto,
            ConflictClusterDto,
            ConflictReportResponse,
            ScheduleGroup,
            ScheduleEntry,
            ScheduleMeeting,
            EntryWithMeetings,
            ScheduleError,
            Room,
            CreateRoomsForm,
            RoomError,
        )
    ),
    tags(
        (name = "Timetable API", description = "Course timetable generation and editing")
    )
)]
pub struct ApiDoc;
