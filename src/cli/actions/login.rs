use crate::{
    authority::LoginRequest,
    cli::globals::GlobalArgs,
    hardware,
    session::heartbeat,
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use tracing::info;
use ulid::Ulid;

#[derive(Debug)]
pub struct Args {
    pub student_id: String,
    pub access_token: SecretString,
    pub code: SecretString,
    pub hardware_id: Option<String>,
    pub device_id: Option<String>,
    pub hold: bool,
    pub heartbeat_period: Duration,
}

impl Args {
    fn request(&self) -> LoginRequest {
        LoginRequest {
            student_id: self.student_id.clone(),
            access_token: self.access_token.expose_secret().to_string(),
            totp_code: self.code.expose_secret().to_string(),
            hardware_id: self
                .hardware_id
                .clone()
                .unwrap_or_else(hardware::fingerprint),
            device_id: self.device_id.clone(),
            computer_name: hardware::computer_name(),
        }
    }
}

/// Log in on this machine and optionally hold the session open.
///
/// # Errors
/// Returns the authentication failure, or an error if a store cannot be written.
pub async fn execute(args: Args, globals: &GlobalArgs) -> Result<()> {
    let authority = globals.authority()?;
    let login = authority.login(&args.request())?;
    let session = &login.session.session;

    println!("Authentication successful");
    println!("  exam:    {}", login.credential.exam_id);
    println!("  session: {}", session.session_id);
    if login.session.resumed {
        println!("  resumed the active session on this device");
    }
    for previous in &login.session.taken_over {
        println!(
            "  ended session {} on {} ({})",
            previous.session_id, previous.device_id, previous.computer_name
        );
    }

    if args.hold {
        hold(globals, session.session_id, args.heartbeat_period).await?;
    }
    Ok(())
}

async fn hold(globals: &GlobalArgs, session_id: Ulid, period: Duration) -> Result<()> {
    let registry = Arc::new(globals.session_registry()?);
    let mut beats = heartbeat::spawn(Arc::clone(&registry), session_id, period);

    println!("Holding session {session_id}; press Ctrl-C to end it");
    info!(%session_id, period_seconds = period.as_secs(), "holding session");

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            beats.abort();
            let session = heartbeat::run_blocking(&registry, move |r| r.end(session_id, false))
                .await
                .context("ending the session did not complete")??;
            println!("Session {} ended ({})", session.session_id,
                session.end_reason.map_or_else(|| "ended".to_string(), |r| r.to_string()));
        }
        stopped = &mut beats => {
            let reason = stopped.context("heartbeat task failed")?;
            println!("Session {session_id} is no longer active: {reason}");
        }
    }
    Ok(())
}
