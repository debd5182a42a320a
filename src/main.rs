//! Sequence Timer CLI - countdown timers and multi-step sequences
//!
//! Runs one saved timer or sequence in the foreground:
//! - a progress line on every tick
//! - a notification when each step and the whole run finishes
//! - Ctrl-C stops the run and keeps its position

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use sequence_timer::cli::{self, Cli, Commands, Display, QuickArgs, RunOutcome};
use sequence_timer::{
    ConsoleNotificationSender, DefinitionError, DefinitionSource, DefinitionsFile, EngineConfig,
    EntityId, NotificationDispatcher, PlaybackService, TimerDefinition,
};

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{e:#}"));
        if let Some(err) = e.downcast_ref::<DefinitionError>() {
            eprintln!("  hint: {}", err.suggestion());
        }
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// What to play in the foreground.
#[derive(Debug, Clone, Copy)]
enum Playback {
    Timer(EntityId),
    Sequence(EntityId),
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    let config = EngineConfig::default().with_tick_interval_ms(cli.tick_millis);

    match cli.command {
        Some(Commands::Timer { id }) => {
            let definitions = open_definitions(cli.definitions)?;
            play(config, &definitions, Playback::Timer(id)).await?;
        }
        Some(Commands::Sequence { id }) => {
            let definitions = open_definitions(cli.definitions)?;
            play(config, &definitions, Playback::Sequence(id)).await?;
        }
        Some(Commands::Quick(args)) => {
            let definitions = open_definitions(cli.definitions)?;
            let id = add_quick_timer(&definitions, &args).await?;
            play(config, &definitions, Playback::Timer(id)).await?;
        }
        Some(Commands::List) => {
            let definitions = open_definitions(cli.definitions)?;
            Display::show_list(&definitions.timers().await?, &definitions.sequences().await?);
        }
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
        }
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

/// Loads the definitions file, falling back to the default location.
fn open_definitions(path: Option<PathBuf>) -> Result<DefinitionsFile> {
    let path = match path {
        Some(path) => path,
        None => DefinitionsFile::default_path()
            .context("could not determine the home directory, pass --definitions")?,
    };
    tracing::debug!(path = %path.display(), "loading definitions");
    Ok(DefinitionsFile::open(path)?)
}

/// Adds an unsaved timer for the quick command and returns its ID.
async fn add_quick_timer(definitions: &DefinitionsFile, args: &QuickArgs) -> Result<EntityId> {
    let id = definitions
        .timers()
        .await?
        .iter()
        .map(|timer| timer.id)
        .max()
        .map_or(1, |id| id + 1);
    let timer = TimerDefinition::new(id, args.label.clone(), args.seconds)
        .with_notification_kind(args.kind);
    definitions.catalog().insert_timer(timer)?;
    Ok(id)
}

/// Plays one timer or sequence while delivering its notifications.
async fn play(
    config: EngineConfig,
    definitions: &DefinitionsFile,
    target: Playback,
) -> Result<RunOutcome> {
    let service =
        PlaybackService::new(config, definitions).context("failed to start the playback engines")?;
    let dispatcher = NotificationDispatcher::new(ConsoleNotificationSender::new(), definitions);
    let timer_events = service.timers().subscribe();
    let sequence_events = service.sequences().subscribe();

    let playback = async move {
        let outcome = match target {
            Playback::Timer(id) => cli::play_timer(&service, id, cli::ctrl_c()).await,
            Playback::Sequence(id) => cli::play_sequence(&service, id, cli::ctrl_c()).await,
        };
        // Dropping the engines closes their event channels so the dispatcher can finish.
        drop(service);
        outcome
    };

    let (outcome, delivered) =
        tokio::join!(playback, dispatcher.run(timer_events, sequence_events));
    tracing::debug!(delivered, ?target, "playback finished");
    outcome
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sequence_timer::types::NotificationKind;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::parse_from(["sequence-timer"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_completions() {
        let cli = Cli::parse_from(["sequence-timer", "completions", "bash"]);
        assert!(matches!(cli.command, Some(Commands::Completions { .. })));
    }

    #[test]
    fn test_open_definitions_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let definitions = open_definitions(Some(dir.path().join("defs.json"))).unwrap();
        assert!(definitions.catalog().to_definitions().timers.is_empty());
    }

    #[tokio::test]
    async fn test_add_quick_timer_uses_next_free_id() {
        let dir = TempDir::new().unwrap();
        let definitions = open_definitions(Some(dir.path().join("defs.json"))).unwrap();
        definitions
            .catalog()
            .insert_timer(TimerDefinition::new(4, "Tea", 60))
            .unwrap();
        let args = QuickArgs {
            seconds: 5,
            label: "Eggs".to_string(),
            kind: NotificationKind::Alarm,
        };

        let id = add_quick_timer(&definitions, &args).await.unwrap();

        assert_eq!(id, 5);
        let timer = definitions.timer(5).await.unwrap().unwrap();
        assert_eq!(timer.label, "Eggs");
        assert_eq!(timer.notification_kind, NotificationKind::Alarm);
    }
}
