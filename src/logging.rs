use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    // RUST_LOG wins over the configured level
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("askdb={}", config.level)))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn split_log_path(path: &Path) -> io::Result<(PathBuf, String)> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Log file path has no file name: {}", path.display()),
            )
        })?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((directory, file_name))
}

/// Install the global tracing subscriber.
///
/// Returns the appender guard when file output is enabled; keep it alive for
/// the lifetime of the process or buffered lines are lost.
pub fn init(config: &LoggingConfig) -> io::Result<Option<WorkerGuard>> {
    let console_layer = config
        .console_output
        .then(|| fmt::layer().with_target(false).with_writer(io::stderr));

    let (file_layer, guard) = if config.file_output {
        let path = PathBuf::from(&config.file_path);
        let (directory, file_name) = split_log_path(&path)?;
        std::fs::create_dir_all(&directory)?;

        let appender = tracing_appender::rolling::never(&directory, &file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let layer = fmt::layer().with_ansi(false).with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(build_filter(config))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/var/log/askdb.log", "/var/log", "askdb.log")]
    #[case("askdb.log", ".", "askdb.log")]
    fn test_split_log_path(#[case] input: &str, #[case] directory: &str, #[case] file: &str) {
        let (dir, name) = split_log_path(Path::new(input)).unwrap();
        assert_eq!(dir, PathBuf::from(directory));
        assert_eq!(name, file);
    }

    #[test]
    fn test_split_log_path_requires_file_name() {
        assert!(split_log_path(Path::new("/")).is_err());
    }
}
