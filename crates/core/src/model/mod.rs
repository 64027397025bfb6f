mod catalog;
mod ids;
mod page;
mod results;
mod session;
mod session_activity;

pub use catalog::{Group, NewGroup, NewStudyActivity, StudyActivity};
pub use ids::{ActivityId, GroupId, ParseIdError, SessionActivityId, SessionId};
pub use page::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, PageRequest};
pub use results::SessionResults;
pub use session::{NewSession, Session, SessionError, SessionStatus};
pub use session_activity::{
    ActivityResult, ActivityScore, NewSessionActivity, SessionActivity, SessionActivityError,
};
