use super::{EndReason, Session, SessionError, SessionStart, StartRequest};
use crate::{
    clock::{Clock, SystemClock},
    store::{Commit, RecordStore, StoreError},
};
use std::time::SystemTime;
use tracing::{info, instrument, warn};
use ulid::Ulid;

pub struct SessionRegistry<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S, C> SessionRegistry<S, C>
where
    S: RecordStore<Session>,
    C: Clock,
{
    #[must_use]
    pub const fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Make `request.device_id` the student's only active session.
    ///
    /// An active session on the same device for the same exam is resumed.
    /// Any other active session of the student is ended as taken over, in
    /// the same write that activates the new one.
    ///
    /// # Errors
    /// Returns an error if the session store cannot be written.
    #[instrument(skip(self, request), fields(student_id = %request.student_id, device_id = %request.device_id))]
    pub fn start(&self, request: StartRequest) -> Result<SessionStart, StoreError> {
        let now = self.clock.now();
        let new_id = Ulid::from_datetime(SystemTime::from(now));

        let outcome = self.store.update(|sessions| {
            let resume_at = sessions.iter().position(|s| {
                s.is_active
                    && s.belongs_to(&request.student_id)
                    && s.device_id == request.device_id
                    && s.exam_id == request.exam_id
            });
            let keep = resume_at.map(|i| sessions[i].session_id);

            let mut taken_over = Vec::new();
            for session in sessions
                .iter_mut()
                .filter(|s| s.is_active && s.belongs_to(&request.student_id))
                .filter(|s| Some(s.session_id) != keep)
            {
                session.close(now, EndReason::TakenOver);
                session.taken_over_by = Some(request.device_id.clone());
                taken_over.push(session.clone());
            }

            let (session, resumed) = match resume_at {
                Some(i) => {
                    let session = &mut sessions[i];
                    session.last_heartbeat_at = now;
                    session.computer_name.clone_from(&request.computer_name);
                    (session.clone(), true)
                }
                None => {
                    let session = Session {
                        session_id: new_id,
                        student_id: request.student_id.trim().to_string(),
                        exam_id: request.exam_id.clone(),
                        device_id: request.device_id.clone(),
                        computer_name: request.computer_name.clone(),
                        started_at: now,
                        last_heartbeat_at: now,
                        is_active: true,
                        ended_at: None,
                        end_reason: None,
                        taken_over_by: None,
                    };
                    sessions.push(session.clone());
                    (session, false)
                }
            };

            Commit::Save(SessionStart {
                session,
                resumed,
                taken_over,
            })
        })?;

        for previous in &outcome.taken_over {
            warn!(
                previous_session = %previous.session_id,
                previous_device = %previous.device_id,
                "session taken over"
            );
        }
        info!(
            session_id = %outcome.session.session_id,
            exam_id = %outcome.session.exam_id,
            resumed = outcome.resumed,
            "session started"
        );
        Ok(outcome)
    }

    /// Record liveness for an active session.
    ///
    /// # Errors
    /// `NotFound` for an unknown id, `Ended` once the session is inactive,
    /// `StorageUnavailable` on a failed write.
    #[instrument(skip(self))]
    pub fn heartbeat(&self, session_id: Ulid) -> Result<Session, SessionError> {
        let now = self.clock.now();
        self.store
            .update(|sessions| match find_active(sessions, session_id) {
                Ok(session) => {
                    session.last_heartbeat_at = now;
                    Commit::Save(Ok(session.clone()))
                }
                Err(err) => Commit::Discard(Err(err)),
            })?
    }

    /// End an active session. Terminal: later heartbeats and ends fail.
    ///
    /// # Errors
    /// `NotFound` for an unknown id, `Ended` if it already ended,
    /// `StorageUnavailable` on a failed write.
    #[instrument(skip(self))]
    pub fn end(&self, session_id: Ulid, submitted: bool) -> Result<Session, SessionError> {
        let now = self.clock.now();
        let reason = if submitted {
            EndReason::Submitted
        } else {
            EndReason::Abandoned
        };

        let session = self
            .store
            .update(|sessions| match find_active(sessions, session_id) {
                Ok(session) => {
                    session.close(now, reason);
                    Commit::Save(Ok(session.clone()))
                }
                Err(err) => Commit::Discard(Err(err)),
            })??;

        info!(%reason, "session ended");
        Ok(session)
    }

    /// The student's active session, if any.
    #[must_use]
    pub fn active_for(&self, student_id: &str) -> Option<Session> {
        self.store
            .load()
            .into_iter()
            .filter(|s| s.is_active && s.belongs_to(student_id))
            .max_by_key(|s| s.started_at)
    }

    /// Whether `session_id` is still the active session for its device.
    #[must_use]
    pub fn is_live(&self, session_id: Ulid) -> bool {
        self.find(session_id).is_some_and(|s| s.is_active)
    }

    #[must_use]
    pub fn find(&self, session_id: Ulid) -> Option<Session> {
        self.store
            .load()
            .into_iter()
            .find(|s| s.session_id == session_id)
    }

    #[must_use]
    pub fn list(&self) -> Vec<Session> {
        self.store.load()
    }
}

fn find_active(sessions: &mut [Session], session_id: Ulid) -> Result<&mut Session, SessionError> {
    let session = sessions
        .iter_mut()
        .find(|s| s.session_id == session_id)
        .ok_or(SessionError::NotFound(session_id))?;
    if session.is_active {
        Ok(session)
    } else {
        Err(SessionError::Ended {
            session_id,
            reason: session.end_reason.unwrap_or(EndReason::Abandoned),
        })
    }
}
