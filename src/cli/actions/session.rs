use crate::{
    cli::globals::GlobalArgs,
    clock::{Clock, SystemClock},
    session::Session,
};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use ulid::Ulid;

#[derive(Debug)]
pub struct ListArgs {
    pub student_id: Option<String>,
    pub active_only: bool,
    pub stale_after: Duration,
}

/// # Errors
/// Returns an error if the session is unknown, already ended, or the store cannot be written.
pub fn end(session_id: Ulid, submitted: bool, globals: &GlobalArgs) -> Result<()> {
    let authority = globals.authority()?;
    let session = authority.sessions().end(session_id, submitted)?;
    if let Some(reason) = session.end_reason {
        println!("Session {session_id} ended ({reason})");
    }
    Ok(())
}

/// # Errors
/// Returns an error if the session is unknown, already ended, or the store cannot be written.
pub fn heartbeat(session_id: Ulid, globals: &GlobalArgs) -> Result<()> {
    let authority = globals.authority()?;
    let session = authority.sessions().heartbeat(session_id)?;
    println!("Session {session_id} alive at {}", session.last_heartbeat_at);
    Ok(())
}

/// # Errors
/// Returns an error if the data directory cannot be opened.
pub fn list(args: &ListArgs, globals: &GlobalArgs) -> Result<()> {
    let authority = globals.authority()?;
    let now = SystemClock.now();

    let mut sessions: Vec<Session> = authority
        .sessions()
        .list()
        .into_iter()
        .filter(|s| !args.active_only || s.is_active)
        .filter(|s| args.student_id.as_deref().map_or(true, |id| s.belongs_to(id)))
        .collect();
    sessions.sort_by_key(|s| s.started_at);

    if sessions.is_empty() {
        println!("No sessions");
        return Ok(());
    }
    for session in &sessions {
        println!(
            "{}  {:<12} {:<12} {:<16} {}  started {}",
            session.session_id,
            session.student_id,
            session.exam_id,
            session.device_id,
            describe(session, now, args.stale_after),
            session.started_at,
        );
    }
    Ok(())
}

fn describe(session: &Session, now: DateTime<Utc>, stale_after: Duration) -> String {
    match (session.is_active, session.end_reason) {
        (true, _) if session.is_stale(now, stale_after) => {
            format!("active (stale since {})", session.last_heartbeat_at)
        }
        (true, _) => "active".to_string(),
        (false, Some(reason)) => {
            let by = session
                .taken_over_by
                .as_deref()
                .map(|device| format!(" by {device}"))
                .unwrap_or_default();
            format!("{reason}{by}")
        }
        (false, None) => "ended".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        session::{SessionRegistry, StartRequest},
        store::MemoryStore,
    };

    #[test]
    fn test_describe() {
        let clock = ManualClock::at_unix(1_740_823_200);
        let registry = SessionRegistry::new(MemoryStore::new(), clock.clone());
        let first = registry
            .start(StartRequest::new("S1", "EXAM001", "deviceA", "PC"))
            .unwrap()
            .session;
        let second = registry
            .start(StartRequest::new("S1", "EXAM001", "deviceB", "PC"))
            .unwrap()
            .session;

        let stale_after = Duration::seconds(180);
        let first = registry.find(first.session_id).unwrap();
        assert_eq!(describe(&first, clock.now(), stale_after), "taken over by deviceB");
        assert_eq!(describe(&second, clock.now(), stale_after), "active");
        assert!(describe(&second, clock.now() + Duration::seconds(181), stale_after)
            .starts_with("active (stale since"));
    }

    #[test]
    fn test_end_and_heartbeat_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let globals = GlobalArgs::new(dir.path().to_path_buf(), None);
        let started = globals
            .authority()
            .unwrap()
            .sessions()
            .start(StartRequest::new("S1", "EXAM001", "deviceA", "PC"))
            .unwrap();
        let id = started.session.session_id;

        heartbeat(id, &globals).unwrap();
        end(id, true, &globals).unwrap();
        assert!(heartbeat(id, &globals).is_err());
        assert!(end(id, true, &globals).is_err());
        assert!(end(Ulid::new(), true, &globals).is_err());
    }
}
