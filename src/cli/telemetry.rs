use anyhow::Result;
use std::{
    fs::{self, File, OpenOptions},
    path::Path,
    sync::Mutex,
};
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, EnvFilter, Layer, Registry,
};

/// Open the diagnostic log for appending, creating its directory.
fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// The log file records at least `INFO`; more with `-vvv` and up.
fn file_level(verbosity_level: Option<Level>) -> LevelFilter {
    match verbosity_level {
        Some(level) if level == Level::DEBUG || level == Level::TRACE => LevelFilter::from_level(level),
        _ => LevelFilter::INFO,
    }
}

/// Initialize stderr logging plus the append-only log file.
///
/// A log file that cannot be opened only produces a warning on stderr.
///
/// # Errors
///
/// Returns an error if the subscriber cannot be installed
pub fn init(verbosity_level: Option<Level>, log_file: &Path) -> Result<()> {
    let stderr_level = verbosity_level.unwrap_or(Level::ERROR);

    let filter = EnvFilter::builder()
        .with_default_directive(stderr_level.into())
        .from_env_lossy();

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false)
        .with_filter(filter);

    let file_layer = match open_log_file(log_file) {
        Ok(file) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .with_filter(file_level(verbosity_level)),
        ),
        Err(err) => {
            eprintln!("warning: cannot open {}: {err}", log_file.display());
            None
        }
    };

    let subscriber = Registry::default().with(stderr_layer).with(file_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_level() {
        assert_eq!(file_level(None), LevelFilter::INFO);
        assert_eq!(file_level(Some(Level::WARN)), LevelFilter::INFO);
        assert_eq!(file_level(Some(Level::DEBUG)), LevelFilter::DEBUG);
        assert_eq!(file_level(Some(Level::TRACE)), LevelFilter::TRACE);
    }

    #[test]
    fn test_open_log_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("examgate.log");

        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_open_log_file_fails_on_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_log_file(dir.path()).is_err());
    }
}
