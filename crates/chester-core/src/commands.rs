//! Chat command surface.
//!
//! [`parse_command`] turns a raw chat message into a [`Command`];
//! [`CommandHandlers`] runs it against the controller and renders the
//! user-facing reply. Errors that are the user's business (unknown track,
//! not in a voice channel, ...) become plain notices here; anything else is
//! logged and reported generically.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::acquisition::TrackAcquirer;
use crate::error::{ChesterError, ErrorKind};
use crate::library::{format_listing, LibraryCatalog, TrackId};
use crate::session::{BreakOutcome, Caller, PlayOutcome, SessionController, StopOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play(TrackId),
    Stop,
    Loop,
    Break,
    RegisterBreak(TrackId),
    Library,
    Download(String),
    HardReset,
    Help,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown command `{0}`")]
    Unknown(String),

    #[error("`{command}` needs a {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("Unbalanced quotes")]
    Unbalanced,
}

/// Parse a chat message.
///
/// Returns `Ok(None)` for messages that don't start with `prefix`. Command
/// names are case-insensitive; `play` joins all of its words into one track
/// id.
pub fn parse_command(prefix: &str, text: &str) -> Result<Option<Command>, ParseError> {
    let Some(body) = text.trim().strip_prefix(prefix) else {
        return Ok(None);
    };
    let words = shlex::split(body).ok_or(ParseError::Unbalanced)?;
    let Some((name, args)) = words.split_first() else {
        return Ok(None);
    };

    let command = match name.to_lowercase().as_str() {
        "play" => {
            if args.is_empty() {
                return Err(ParseError::MissingArgument {
                    command: "play",
                    argument: "track id",
                });
            }
            Command::Play(TrackId::from(args.join(" ")))
        }
        "stop" => Command::Stop,
        "loop" => Command::Loop,
        "break" => Command::Break,
        "registerbreak" => match args.first() {
            Some(id) => Command::RegisterBreak(TrackId::from(id.as_str())),
            None => {
                return Err(ParseError::MissingArgument {
                    command: "registerbreak",
                    argument: "track id",
                })
            }
        },
        "library" => Command::Library,
        "download" => match args.first() {
            Some(url) => Command::Download(url.clone()),
            None => {
                return Err(ParseError::MissingArgument {
                    command: "download",
                    argument: "URL",
                })
            }
        },
        "hardreset" => Command::HardReset,
        "help" => Command::Help,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

pub struct CommandHandlers {
    controller: Arc<SessionController>,
    acquirer: Arc<dyn TrackAcquirer>,
    prefix: String,
}

impl CommandHandlers {
    pub fn new(
        controller: Arc<SessionController>,
        acquirer: Arc<dyn TrackAcquirer>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            controller,
            acquirer,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn catalog(&self) -> &LibraryCatalog {
        self.controller.catalog()
    }

    /// Run `command` for `caller` and return the reply text.
    pub async fn handle(&self, caller: &Caller, command: Command) -> String {
        let mention = caller.user_id.mention();
        let reply = match command {
            Command::Play(id) => self.play(caller, &id).await,
            Command::Stop => self.stop(caller).await,
            Command::Loop => self.toggle_loop(caller).await,
            Command::Break => self.toggle_break(caller).await,
            Command::RegisterBreak(id) => self.register_break(caller, &id),
            Command::Library => Ok(format_listing(&self.catalog().list())),
            Command::Download(url) => self.download(&url).await,
            Command::HardReset => self.hard_reset(),
            Command::Help => Ok(self.help()),
        };
        match reply {
            Ok(text) => format!("{mention} {text}"),
            Err(e) => format!("{mention} {}", self.notice(&e)),
        }
    }

    /// Reply to a message that failed to parse.
    pub fn parse_failure(&self, caller: &Caller, error: &ParseError) -> String {
        format!(
            "{} {}. Try `{}help`.",
            caller.user_id.mention(),
            error,
            self.prefix
        )
    }

    async fn play(&self, caller: &Caller, id: &TrackId) -> Result<String, ChesterError> {
        Ok(match self.controller.play(caller, id).await? {
            PlayOutcome::Started(track) => format!("Now playing `{}` ({}).", track.title, track.id),
            PlayOutcome::OnBreak => {
                "Currently on break. End the break before playing something else.".to_string()
            }
        })
    }

    async fn stop(&self, caller: &Caller) -> Result<String, ChesterError> {
        Ok(match self.controller.stop(caller).await? {
            StopOutcome::Stopped => "Left the channel.".to_string(),
            StopOutcome::NothingPlaying => "There is no active track.".to_string(),
        })
    }

    async fn toggle_loop(&self, caller: &Caller) -> Result<String, ChesterError> {
        let enabled = self.controller.toggle_loop(caller).await?;
        Ok(format!("Loop {}", if enabled { "enabled" } else { "disabled" }))
    }

    async fn toggle_break(&self, caller: &Caller) -> Result<String, ChesterError> {
        Ok(match self.controller.toggle_break(caller).await? {
            BreakOutcome::Started { track, .. } => {
                format!("Break time! Looping `{}` until the next break.", track.title)
            }
            BreakOutcome::Ended {
                resumed: Some(track),
            } => format!("Break over. Back to `{}` from the top.", track.title),
            BreakOutcome::Ended { resumed: None } => "Break over. Nothing to resume.".to_string(),
        })
    }

    fn register_break(&self, caller: &Caller, id: &TrackId) -> Result<String, ChesterError> {
        let previous = self.controller.register_break(caller, id)?;
        Ok(match previous {
            Some(old) if &old != id => format!("Break track changed from `{old}` to `{id}`."),
            _ => format!("Break track set to `{id}`."),
        })
    }

    async fn download(&self, url: &str) -> Result<String, ChesterError> {
        let id = self.acquirer.acquire(url).await?;
        self.catalog().load()?;
        let track = self.catalog().get(&id)?;
        Ok(format!(
            "Successfully downloaded track `{}` ({}).",
            track.title, track.id
        ))
    }

    fn hard_reset(&self) -> Result<String, ChesterError> {
        let catalog = self.catalog();
        let removed =
            clear_directory(catalog.library_dir()) + clear_directory(catalog.metadata_dir());
        catalog.load()?;
        log::info!("Hard reset removed {} file(s)", removed);
        Ok(format!("Hard reset complete ({removed} file(s) removed)."))
    }

    fn help(&self) -> String {
        let p = &self.prefix;
        [
            format!("`{p}play <track id>` play a track from the library"),
            format!("`{p}stop` stop and leave the channel"),
            format!("`{p}loop` toggle looping of the current track"),
            format!("`{p}break` toggle your break track"),
            format!("`{p}registerbreak <track id>` choose your break track"),
            format!("`{p}library` list downloaded tracks"),
            format!("`{p}download <url>` download a track"),
            format!("`{p}hardreset` delete every downloaded track"),
        ]
        .join("\n")
    }

    fn notice(&self, error: &ChesterError) -> String {
        match error {
            ChesterError::NotInVoiceChannel => {
                "You are not connected to a voice channel.".to_string()
            }
            ChesterError::TrackNotFound(id) => {
                format!("There is no track `{id}` in the library.")
            }
            ChesterError::BreakNotRegistered(_) => format!(
                "You have no break track registered. Use `{}registerbreak <track id>` first.",
                self.prefix
            ),
            ChesterError::ChannelUnreachable(_) => "I can't join your voice channel.".to_string(),
            ChesterError::Acquisition(reason) => format!("Download failed: {reason}"),
            other => match other.kind() {
                ErrorKind::IoFailure => {
                    log::error!("Library I/O failure: {}", other);
                    format!("The library could not be loaded: {other}")
                }
                _ => {
                    log::error!("Command failed: {}", other);
                    "An internal error occurred. Please contact the developer.".to_string()
                }
            },
        }
    }
}

/// Remove every regular file in `dir`. Failures are logged, not fatal.
fn clear_directory(dir: &Path) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Skipping {}: {}", dir.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => log::error!("Failed to delete {}. Reason: {}", path.display(), e),
        }
    }
    removed
}
