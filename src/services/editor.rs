use tracing::debug;

use crate::{
    error::AppError,
    models::trip::{Trip, TripDraft},
    services::trips::TripCoordinator,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum EditorState {
    #[default]
    Empty,
    Editing(TripDraft),
    Submitting,
}

/// Lifecycle of one trip form: open a draft, change it, submit. A failed
/// submit puts the same draft back with the error attached; a successful
/// one clears the form.
#[derive(Debug, Default)]
pub struct TripEditor {
    state: EditorState,
    error: Option<String>,
}

impl TripEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// Notification from the last failed submit, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn open(&mut self, draft: TripDraft) -> Result<(), AppError> {
        match self.state {
            EditorState::Empty => {
                self.state = EditorState::Editing(draft);
                self.error = None;
                Ok(())
            }
            _ => Err(AppError::BadRequest(
                "Já existe uma viagem em edição.".into(),
            )),
        }
    }

    pub fn draft_mut(&mut self) -> Result<&mut TripDraft, AppError> {
        match &mut self.state {
            EditorState::Editing(draft) => Ok(draft),
            _ => Err(AppError::BadRequest("Nenhuma viagem em edição.".into())),
        }
    }

    pub fn cancel(&mut self) {
        self.state = EditorState::Empty;
        self.error = None;
    }

    pub async fn submit(&mut self, trips: &TripCoordinator) -> Result<Trip, AppError> {
        let draft = match std::mem::replace(&mut self.state, EditorState::Submitting) {
            EditorState::Editing(draft) => draft,
            other => {
                self.state = other;
                return Err(AppError::BadRequest("Nenhuma viagem em edição.".into()));
            }
        };

        match trips.create_or_update(&draft).await {
            Ok(trip) => {
                debug!(trip_id = %trip.id, "editor submit succeeded");
                self.state = EditorState::Empty;
                self.error = None;
                Ok(trip)
            }
            Err(err) => {
                self.error = Some(err.notification());
                self.state = EditorState::Editing(draft);
                Err(err)
            }
        }
    }
}
