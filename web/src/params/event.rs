use chrono::{DateTime, Utc};
use domain::event::{CreateEvent, UpdateEvent};
use domain::error::Error as DomainError;
use domain::{participants, EventFilter};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct CreateParams {
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) end_time: DateTime<Utc>,
    pub(crate) location: Option<String>,
    /// Emails of the users to invite. Unknown emails are skipped.
    #[serde(default)]
    pub(crate) participant_emails: Vec<String>,
}

impl From<CreateParams> for CreateEvent {
    fn from(params: CreateParams) -> Self {
        Self {
            title: params.title,
            description: params.description,
            start_time: params.start_time,
            end_time: params.end_time,
            location: params.location,
            participant_emails: params.participant_emails,
        }
    }
}

/// Only the fields present are changed. `participant_emails`, when given, replaces the
/// whole participant list.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub(crate) struct UpdateParams {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) start_time: Option<DateTime<Utc>>,
    pub(crate) end_time: Option<DateTime<Utc>>,
    pub(crate) location: Option<String>,
    pub(crate) participant_emails: Option<Vec<String>>,
}

impl From<UpdateParams> for UpdateEvent {
    fn from(params: UpdateParams) -> Self {
        Self {
            title: params.title,
            description: params.description,
            start_time: params.start_time,
            end_time: params.end_time,
            location: params.location,
            participant_emails: params.participant_emails,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct IndexParams {
    /// Number of events to skip
    pub(crate) skip: Option<usize>,
    /// Page size, between 1 and 100
    pub(crate) limit: Option<usize>,
    /// Only events starting at or after this instant
    pub(crate) start_date: Option<DateTime<Utc>>,
    /// Only events ending at or before this instant
    pub(crate) end_date: Option<DateTime<Utc>>,
}

impl From<IndexParams> for EventFilter {
    fn from(params: IndexParams) -> Self {
        let defaults = EventFilter::default();
        Self {
            skip: params.skip.unwrap_or(defaults.skip),
            limit: params.limit.unwrap_or(defaults.limit),
            start_date: params.start_date,
            end_date: params.end_date,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct InviteParams {
    pub(crate) participant_email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct RespondParams {
    /// `accepted` or `declined`
    pub(crate) status: String,
}

impl TryFrom<RespondParams> for participants::Status {
    type Error = DomainError;

    fn try_from(params: RespondParams) -> Result<Self, Self::Error> {
        params
            .status
            .parse::<participants::Status>()
            .map_err(|_| DomainError::invalid("Status must be accepted or declined"))
    }
}
