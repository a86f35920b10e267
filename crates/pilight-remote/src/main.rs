//! pilight-remote: command-line remote for a pilight hub.
//!
//! Connects to the hub, starts the heartbeat once the link is up, prints
//! every event on stdout, and sends each line typed on stdin to the hub.
//! Exits when the link drops, or on Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! pilight-remote [OPTIONS]
//!
//! Options:
//!   --host <HOST>        Hub hostname or IP            [env: PILIGHT_HOST]
//!   --port <PORT>        Hub TCP port                  [env: PILIGHT_PORT]
//!   --config <PATH>      TOML config file              [env: PILIGHT_CONFIG]
//!   --json               Print events as JSON lines
//!   --no-heartbeat       Do not probe the hub
//!   --log-level <LEVEL>  Log filter when RUST_LOG is unset
//!   --write-config       Save the effective settings to --config and exit
//! ```
//!
//! Flags override the config file; the config file overrides built-in
//! defaults.  Logs go to stderr so stdout carries only events.

use std::future::Future;
use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pilight_link::{ConnectionEvent, ConnectionManager, Endpoint, LinkConfig, LinkError};
use pilight_remote::{load_config, render, save_config, OutputFormat, RemoteConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Command-line remote for a pilight hub.
#[derive(Debug, Parser)]
#[command(
    name = "pilight-remote",
    about = "Streams pilight hub events to stdout and forwards stdin lines to the hub",
    version
)]
struct Cli {
    /// Hostname or IP address of the hub.  Overrides `[hub] host`.
    #[arg(long, env = "PILIGHT_HOST")]
    host: Option<String>,

    /// TCP port of the hub.  Overrides `[hub] port`.
    #[arg(long, env = "PILIGHT_PORT")]
    port: Option<u16>,

    /// Path to the TOML config file.  A missing file means defaults.
    #[arg(long, default_value = "pilight-remote.toml", env = "PILIGHT_CONFIG")]
    config: PathBuf,

    /// Print events as one JSON object per line.
    #[arg(long)]
    json: bool,

    /// Do not start the heartbeat monitor after connecting.
    #[arg(long)]
    no_heartbeat: bool,

    /// `tracing` filter used when `RUST_LOG` is unset.  Overrides
    /// `[remote] log_level`.
    #[arg(long)]
    log_level: Option<String>,

    /// Write the effective settings (file plus flags) to `--config` and exit.
    #[arg(long)]
    write_config: bool,
}

/// Fully resolved run settings: defaults, then file, then flags.
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    endpoint: Endpoint,
    link: LinkConfig,
    heartbeat: bool,
    format: OutputFormat,
    log_level: String,
}

impl Cli {
    /// Loads the config file and applies the command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed.
    fn merged_config(&self) -> anyhow::Result<RemoteConfig> {
        let mut config = load_config(&self.config)
            .with_context(|| format!("loading config from {}", self.config.display()))?;

        if let Some(host) = &self.host {
            config.hub.host = host.clone();
        }
        if let Some(port) = self.port {
            config.hub.port = port;
        }
        if self.no_heartbeat {
            config.remote.heartbeat = false;
        }
        if let Some(level) = &self.log_level {
            config.remote.log_level = level.clone();
        }
        Ok(config)
    }

    /// Resolves the run settings: defaults, then file, then flags.
    ///
    /// # Errors
    ///
    /// See [`Cli::merged_config`].
    fn into_settings(self) -> anyhow::Result<Settings> {
        let config = self.merged_config()?;

        Ok(Settings {
            endpoint: Endpoint::new(config.hub.host, config.hub.port),
            link: config.timing,
            heartbeat: config.remote.heartbeat,
            format: if self.json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            log_level: config.remote.log_level,
        })
    }

    /// Saves the merged configuration to the `--config` path.
    ///
    /// # Errors
    ///
    /// Returns an error if the existing file cannot be loaded or the new one
    /// cannot be written.
    fn write_config(&self) -> anyhow::Result<()> {
        let config = self.merged_config()?;
        save_config(&self.config, &config)
            .with_context(|| format!("writing config to {}", self.config.display()))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.write_config {
        cli.write_config()?;
        println!("wrote {}", cli.config.display());
        return Ok(());
    }
    let settings = cli.into_settings()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .init();

    info!("pilight-remote starting, hub={}", settings.endpoint);
    let stdin = BufReader::new(tokio::io::stdin());
    run(settings, stdin, tokio::signal::ctrl_c()).await
}

/// Event loop: hub events to stdout, `input` lines to the hub, until the
/// link drops or `shutdown` resolves.
///
/// `shutdown` is polled across loop passes, so a signal handler it installs
/// stays registered for the whole run.
async fn run(
    settings: Settings,
    input: impl AsyncBufRead + Unpin,
    shutdown: impl Future<Output = io::Result<()>>,
) -> anyhow::Result<()> {
    let (manager, mut events) = ConnectionManager::new(settings.link)?;
    manager.connect(settings.endpoint.host.clone(), settings.endpoint.port);

    let mut stdin = input.lines();
    let mut stdin_open = true;

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                println!("{}", render(&event, settings.format)?);

                match event {
                    ConnectionEvent::Connected if settings.heartbeat => {
                        // The link may already have failed again; the Error
                        // event that follows ends the loop.
                        if let Err(LinkError::NotConnected) = manager.start_heartbeat() {
                            warn!("link dropped before the heartbeat could start");
                        }
                    }
                    ConnectionEvent::Error => {
                        anyhow::bail!("connection to {} failed", settings.endpoint);
                    }
                    ConnectionEvent::Disconnected => break,
                    _ => {}
                }
            }

            line = stdin.next_line(), if stdin_open => {
                match line.context("reading stdin")? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => manager.send(line),
                    None => {
                        info!("stdin closed; still listening to the hub");
                        stdin_open = false;
                    }
                }
            }

            signal = &mut shutdown => {
                signal.context("listening for shutdown signal")?;
                info!("shutdown requested, disconnecting");
                manager.disconnect();
                // The channel sink has already received Disconnected, if any.
                while let Ok(event) = events.try_recv() {
                    println!("{}", render(&event, settings.format)?);
                }
                break;
            }
        }
    }

    info!("pilight-remote stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use super::*;

    /// Parses `args` with a config path that does not exist, so only
    /// built-in defaults and flags apply.
    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["pilight-remote", "--config", "/nonexistent/pilight-remote.toml"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_defaults_without_config_file() {
        // Arrange / Act
        let settings = cli(&[]).into_settings().unwrap();

        // Assert
        assert_eq!(settings.endpoint, Endpoint::new("127.0.0.1", 5000));
        assert_eq!(settings.link, LinkConfig::default());
        assert!(settings.heartbeat);
        assert_eq!(settings.format, OutputFormat::Text);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_host_and_port_flags_override() {
        let settings = cli(&["--host", "192.168.1.20", "--port", "5017"])
            .into_settings()
            .unwrap();

        assert_eq!(settings.endpoint.to_string(), "192.168.1.20:5017");
    }

    #[test]
    fn test_json_and_no_heartbeat_flags() {
        let settings = cli(&["--json", "--no-heartbeat"]).into_settings().unwrap();

        assert_eq!(settings.format, OutputFormat::Json);
        assert!(!settings.heartbeat);
    }

    #[test]
    fn test_log_level_flag_overrides_default() {
        let settings = cli(&["--log-level", "debug"]).into_settings().unwrap();
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_invalid_port_is_rejected_by_parser() {
        let result = Cli::try_parse_from(["pilight-remote", "--port", "70000"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_file_values_apply_under_flags() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("pilight-remote-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("remote.toml");
        std::fs::write(
            &path,
            "[hub]\nhost = \"hub.lan\"\nport = 5001\n\n[timing]\nread_timeout_ms = 9000\n",
        )
        .unwrap();

        // Act
        let settings = Cli::parse_from([
            "pilight-remote",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "6000",
        ])
        .into_settings()
        .unwrap();

        // Assert
        assert_eq!(settings.endpoint, Endpoint::new("hub.lan", 6000));
        assert_eq!(settings.link.read_timeout, Duration::from_millis(9000));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_write_config_saves_flags_over_file_values() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("pilight-remote-write-{}", std::process::id()));
        let path = dir.join("nested").join("remote.toml");
        let cli = Cli::parse_from([
            "pilight-remote",
            "--config",
            path.to_str().unwrap(),
            "--host",
            "hub.lan",
            "--no-heartbeat",
            "--write-config",
        ]);
        assert!(cli.write_config);

        // Act
        cli.write_config().unwrap();

        // Assert
        let saved = load_config(&path).unwrap();
        assert_eq!(saved.hub.host, "hub.lan");
        assert_eq!(saved.hub.port, 5000);
        assert!(!saved.remote.heartbeat);
        assert_eq!(saved.timing, LinkConfig::default());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_run_forwards_input_and_stops_on_shutdown() {
        // Arrange: a hub that reports the first line it receives
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (received_tx, received_rx) = oneshot::channel();
        let hub = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(stream).lines();
            let first = lines.next_line().await.unwrap();
            let _ = received_tx.send(());
            // Hold the socket until the remote hangs up.
            let _ = lines.next_line().await;
            first
        });
        let settings = Settings {
            endpoint: Endpoint::new("127.0.0.1", port),
            link: LinkConfig::default(),
            heartbeat: false,
            format: OutputFormat::Json,
            log_level: "info".to_string(),
        };
        let shutdown = async move {
            let _ = received_rx.await;
            Ok(())
        };

        // Act
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run(settings, &b"\nON\n"[..], shutdown),
        )
        .await
        .expect("run must stop once shutdown resolves");

        // Assert: clean exit, blank input skipped, command delivered
        assert!(result.is_ok());
        let first = hub.await.unwrap();
        assert_eq!(first.as_deref(), Some("ON"));
    }
}
