use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use exporters::{default_file_stem, ExportConfig, ExportFormat, Exporter};
use imagegen::{BackendFactory, BackendType, CancelToken, Credential, Generator};
use settings::{AppSettings, CredentialStore};
use std::io::Read;
use std::path::{Path, PathBuf};
use storyboard::{
    AspectRatio, ExtractionPolicy, History, Locale, ParserConfig, PreambleMode, ScriptParser, Shot,
    ShotId, ShotUpdate, Storyboard, StoryboardCommand, StyleTag,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "storyboard-cli")]
#[command(about = "Turn a script into a generated storyboard")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Simple,
    Structured,
}

#[derive(Clone, Copy, ValueEnum)]
enum PreambleArg {
    Keep,
    Drop,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Gemini,
    Mock,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Bundle,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a script into shots and save the storyboard
    Parse {
        /// Script file, or `-` for stdin
        script: PathBuf,

        /// Storyboard file to write
        #[arg(short, long)]
        board: PathBuf,

        #[arg(long)]
        policy: Option<PolicyArg>,

        /// What to do with text before the first shot marker
        #[arg(long)]
        preamble: Option<PreambleArg>,

        /// Style for every parsed shot (sketch, colored-pencil, 2d-animation, 3d-render, realistic, noir)
        #[arg(long)]
        style: Option<StyleTag>,

        /// Placeholder language (en, vi)
        #[arg(long)]
        locale: Option<Locale>,
    },

    /// List the shots of a storyboard
    List {
        #[arg(short, long)]
        board: PathBuf,
    },

    /// Add a placeholder shot
    Add {
        #[arg(short, long)]
        board: PathBuf,

        /// Insert after this shot number instead of appending
        #[arg(long)]
        after: Option<u32>,
    },

    /// Move a shot to a new position (1-based)
    Move {
        #[arg(short, long)]
        board: PathBuf,

        #[arg(long)]
        from: u32,

        #[arg(long)]
        to: u32,
    },

    /// Delete a shot
    Delete {
        #[arg(short, long)]
        board: PathBuf,

        /// Shot number
        shot: u32,
    },

    /// Edit one shot's fields
    Edit {
        #[arg(short, long)]
        board: PathBuf,

        /// Shot number
        shot: u32,

        #[arg(long)]
        summary: Option<String>,

        /// Visual prompt sent to the image model
        #[arg(long)]
        prompt: Option<String>,

        #[arg(long)]
        style: Option<StyleTag>,

        /// Aspect ratio (16:9, 1:1, 9:16, 4:3)
        #[arg(long)]
        aspect: Option<AspectRatio>,

        /// Duration in seconds
        #[arg(long)]
        duration: Option<u32>,

        #[arg(long)]
        shot_type: Option<String>,
    },

    /// Revert the last add, move, delete or edit
    Undo {
        #[arg(short, long)]
        board: PathBuf,
    },

    /// Reapply the last undone change
    Redo {
        #[arg(short, long)]
        board: PathBuf,
    },

    /// Set the style of every shot
    Style {
        #[arg(short, long)]
        board: PathBuf,

        style: StyleTag,
    },

    /// Generate images for one shot or every shot without an image
    Generate {
        #[arg(short, long)]
        board: PathBuf,

        /// Only this shot number
        #[arg(long)]
        shot: Option<u32>,

        #[arg(long)]
        backend: Option<BackendArg>,
    },

    /// Export a fully generated storyboard
    Export {
        #[arg(short, long)]
        board: PathBuf,

        /// Output path; defaults to Storyboard_<N>_Shots_<millis> in the current directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "json")]
        format: FormatArg,

        #[arg(long)]
        title: Option<String>,
    },

    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Store a new key
    Set { key: String },
    /// Remove the stored key
    Clear,
    /// Show whether a key is available
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let settings_path = cli.settings.unwrap_or_else(AppSettings::default_path);
    let settings = AppSettings::load_or_default(&settings_path)?;

    match cli.command {
        Commands::Parse {
            script,
            board,
            policy,
            preamble,
            style,
            locale,
        } => parse_command(&settings, script, board, policy, preamble, style, locale),
        Commands::List { board } => list_command(&board),
        Commands::Add { board, after } => add_command(&board, after),
        Commands::Move { board, from, to } => move_command(&board, from, to),
        Commands::Delete { board, shot } => delete_command(&board, shot),
        Commands::Edit {
            board,
            shot,
            summary,
            prompt,
            style,
            aspect,
            duration,
            shot_type,
        } => {
            let update = ShotUpdate {
                summary,
                visual_prompt: prompt,
                style,
                duration_secs: duration,
                shot_type,
                aspect_ratio: aspect,
            };
            edit_command(&board, shot, update)
        }
        Commands::Undo { board } => undo_command(&board, false),
        Commands::Redo { board } => undo_command(&board, true),
        Commands::Style { board, style } => style_command(&board, style),
        Commands::Generate {
            board,
            shot,
            backend,
        } => generate_command(&settings, &board, shot, backend).await,
        Commands::Export {
            board,
            output,
            format,
            title,
        } => export_command(&board, output, format, title),
        Commands::Key { action } => key_command(action),
    }
}

fn read_script(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read script from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))
    }
}

fn load_board(path: &Path) -> Result<Storyboard> {
    Storyboard::load(path).with_context(|| format!("failed to load storyboard {}", path.display()))
}

fn save_board(board: &Storyboard, path: &Path) -> Result<()> {
    board
        .save(path)
        .with_context(|| format!("failed to save storyboard {}", path.display()))
}

/// Undo journal kept next to the storyboard file.
fn history_path(board_path: &Path) -> PathBuf {
    board_path.with_extension("history.json")
}

/// Runs an undoable edit and persists both the board and its history.
fn execute(
    board_path: &Path,
    build: impl FnOnce(&Storyboard) -> Result<StoryboardCommand>,
) -> Result<Storyboard> {
    let mut board = load_board(board_path)?;
    let history_path = history_path(board_path);
    let mut history = History::load(&history_path)
        .with_context(|| format!("failed to load history {}", history_path.display()))?;

    let command = build(&board)?;
    history.execute(&mut board, command)?;
    save_board(&board, board_path)?;
    history.save(&history_path)?;
    Ok(board)
}

/// Resolves a 1-based shot number to its id.
fn shot_at(board: &Storyboard, number: u32) -> Result<ShotId> {
    number
        .checked_sub(1)
        .and_then(|idx| board.shots().get(idx as usize))
        .map(|s| s.id)
        .with_context(|| format!("no shot #{} (storyboard has {})", number, board.len()))
}

fn print_board(board: &Storyboard) {
    for shot in board.shots() {
        let status = if shot.generation_in_flight {
            "generating"
        } else if shot.has_image() {
            "done"
        } else {
            "pending"
        };
        println!(
            "#{:<3} [{:<14}] {:<10} {}",
            shot.sequence_number,
            shot.style.as_str(),
            status,
            shot.summary
        );
        if shot.visual_prompt != shot.summary {
            println!("      prompt: {}", shot.visual_prompt);
        }
        if let Some(err) = &shot.last_error {
            println!("      error: {}", err);
        }
    }
}

fn parse_command(
    settings: &AppSettings,
    script_path: PathBuf,
    board_path: PathBuf,
    policy: Option<PolicyArg>,
    preamble: Option<PreambleArg>,
    style: Option<StyleTag>,
    locale: Option<Locale>,
) -> Result<()> {
    let mut config: ParserConfig = settings.parser.clone();
    if let Some(policy) = policy {
        config.policy = match policy {
            PolicyArg::Simple => ExtractionPolicy::Simple,
            PolicyArg::Structured => ExtractionPolicy::Structured,
        };
    }
    if let Some(preamble) = preamble {
        config.preamble = match preamble {
            PreambleArg::Keep => PreambleMode::Keep,
            PreambleArg::Drop => PreambleMode::Drop,
        };
    }
    if let Some(locale) = locale {
        config.locale = locale;
    }
    let locale = config.locale;
    let parser = ScriptParser::new(config)?;
    let script = read_script(&script_path)?;

    let mut board = if board_path.exists() {
        load_board(&board_path)?
    } else {
        Storyboard::new(locale)
    };
    let style = style.unwrap_or(settings.default_style);
    if !board.replace_from_script(&parser, &script, style) {
        warn!("script is empty; storyboard left unchanged");
        return Ok(());
    }

    save_board(&board, &board_path)?;
    History::new().save(&history_path(&board_path))?;
    info!(shots = board.len(), path = %board_path.display(), "storyboard written");
    print_board(&board);
    Ok(())
}

fn list_command(board_path: &Path) -> Result<()> {
    let board = load_board(board_path)?;
    print_board(&board);
    if board.is_ready_to_export() {
        println!("ready to export");
    }
    Ok(())
}

fn add_command(board_path: &Path, after: Option<u32>) -> Result<()> {
    let mut added = None;
    let mut board = execute(board_path, |board| {
        let (index, style) = match after {
            Some(number) => {
                let id = shot_at(board, number)?;
                let style = board.get(id).map(|s| s.style).unwrap_or_default();
                (number as usize, style)
            }
            None => (
                board.len(),
                board.selected().map(|s| s.style).unwrap_or_default(),
            ),
        };
        let shot = Shot::placeholder(board.locale(), style);
        added = Some(shot.id);
        Ok(StoryboardCommand::InsertShot {
            shot,
            index: Some(index),
        })
    })?;

    if let Some(id) = added {
        board.select(Some(id))?;
        save_board(&board, board_path)?;
        if let Some(shot) = board.get(id) {
            info!(number = shot.sequence_number, "shot added");
        }
    }
    print_board(&board);
    Ok(())
}

fn move_command(board_path: &Path, from: u32, to: u32) -> Result<()> {
    if from == 0 || to == 0 {
        bail!("shot numbers start at 1");
    }
    let board = execute(board_path, |_| {
        Ok(StoryboardCommand::MoveShot {
            from: from as usize - 1,
            to: to as usize - 1,
        })
    })?;
    print_board(&board);
    Ok(())
}

fn delete_command(board_path: &Path, number: u32) -> Result<()> {
    let board = execute(board_path, |board| {
        Ok(StoryboardCommand::RemoveShot {
            shot_id: shot_at(board, number)?,
        })
    })?;
    print_board(&board);
    Ok(())
}

fn edit_command(board_path: &Path, number: u32, update: ShotUpdate) -> Result<()> {
    if update.is_empty() {
        bail!(
            "nothing to change; pass at least one of \
             --summary, --prompt, --style, --aspect, --duration, --shot-type"
        );
    }
    let board = execute(board_path, |board| {
        Ok(StoryboardCommand::UpdateShot {
            shot_id: shot_at(board, number)?,
            update,
        })
    })?;
    info!(number, "shot updated");
    print_board(&board);
    Ok(())
}

fn undo_command(board_path: &Path, redo: bool) -> Result<()> {
    let mut board = load_board(board_path)?;
    let history_path = history_path(board_path);
    let mut history = History::load(&history_path)?;
    if redo {
        history.redo(&mut board)?;
    } else {
        history.undo(&mut board)?;
    }
    save_board(&board, board_path)?;
    history.save(&history_path)?;
    print_board(&board);
    Ok(())
}

fn style_command(board_path: &Path, style: StyleTag) -> Result<()> {
    let mut board = load_board(board_path)?;
    board.apply_style_to_all(style);
    save_board(&board, board_path)?;
    info!(%style, "style applied to all shots");
    Ok(())
}

async fn generate_command(
    settings: &AppSettings,
    board_path: &Path,
    shot: Option<u32>,
    backend: Option<BackendArg>,
) -> Result<()> {
    let mut config = settings.backend.clone();
    if let Some(backend) = backend {
        config.backend_type = match backend {
            BackendArg::Gemini => BackendType::Gemini,
            BackendArg::Mock => BackendType::Mock,
        };
    }
    let credential = match config.backend_type {
        BackendType::Mock => Credential::new("mock"),
        BackendType::Gemini => CredentialStore::default_location().resolve()?,
    };
    if credential.is_none() {
        bail!("no API key configured; run `storyboard-cli key set <KEY>` or set STORYBOARD_API_KEY");
    }

    let generator = Generator::new(BackendFactory::create(config)?);
    generate_board(&generator, board_path, shot, credential.as_ref()).await
}

/// Generates and saves the board. Any failed shot makes the command fail
/// once the board has been written.
async fn generate_board(
    generator: &Generator,
    board_path: &Path,
    shot: Option<u32>,
    credential: Option<&Credential>,
) -> Result<()> {
    let mut board = load_board(board_path)?;

    let failure = match shot {
        Some(number) => {
            let id = shot_at(&board, number)?;
            let result = generator
                .generate_shot(&mut board, id, credential)
                .await;
            save_board(&board, board_path)?;
            match result {
                Ok(true) => {
                    info!(number, "shot generated");
                    None
                }
                Ok(false) => {
                    warn!(number, "shot is already generating");
                    None
                }
                Err(err) if err.is_credential_invalid() => Some(rejected_key_error()),
                Err(err) => {
                    Some(anyhow::Error::new(err).context(format!("shot #{number} failed")))
                }
            }
        }
        None => {
            let cancel = CancelToken::new();
            let stop = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("stopping after the current shot");
                    stop.cancel();
                }
            });

            let report = generator
                .generate_all(&mut board, credential, &cancel)
                .await?;
            save_board(&board, board_path)?;
            println!(
                "generated {}, failed {}{}",
                report.generated,
                report.failed,
                if report.cancelled { ", stopped" } else { "" }
            );
            if report.credential_invalid {
                Some(rejected_key_error())
            } else if report.failed > 0 {
                Some(anyhow::anyhow!("{} shot(s) failed to generate", report.failed))
            } else {
                None
            }
        }
    };

    print_board(&board);
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn rejected_key_error() -> anyhow::Error {
    anyhow::anyhow!("the API key was rejected; run `storyboard-cli key set <KEY>` with a valid key")
}

fn export_command(
    board_path: &Path,
    output: Option<PathBuf>,
    format: FormatArg,
    title: Option<String>,
) -> Result<()> {
    let board = load_board(board_path)?;
    let format = match format {
        FormatArg::Json => ExportFormat::Json,
        FormatArg::Bundle => ExportFormat::Bundle,
    };
    let output = output.unwrap_or_else(|| {
        let stem = default_file_stem(board.len(), chrono::Utc::now());
        match format {
            ExportFormat::Json => PathBuf::from(format!("{stem}.json")),
            ExportFormat::Bundle => PathBuf::from(stem),
        }
    });

    let mut config = ExportConfig::new(format, output.clone());
    if let Some(title) = title {
        config.title = title;
    }
    let summary = Exporter::new(config)
        .export_storyboard(&board)
        .context("export failed")?;
    println!("exported {} pages to {}", summary.pages, output.display());
    Ok(())
}

fn key_command(action: KeyAction) -> Result<()> {
    let store = CredentialStore::default_location();
    match action {
        KeyAction::Set { key } => {
            let credential = Credential::new(key).context("API key must not be blank")?;
            store.save(&credential)?;
            println!("API key saved to {}", store.path().display());
        }
        KeyAction::Clear => {
            if store.clear()? {
                println!("API key removed");
            } else {
                println!("no API key stored");
            }
        }
        KeyAction::Status => match store.resolve()? {
            Some(_) => println!("API key available"),
            None => println!("no API key configured"),
        },
    }
    Ok(())
}
