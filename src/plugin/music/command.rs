//! Parsing of `music` subcommand lines

use super::error::{MusicError, MusicResult};

pub const MIN_VOLUME: f32 = 0.0;
pub const MAX_VOLUME: f32 = 2.0;

const NO_CLEAR_QUEUE_FLAGS: [&str; 2] = ["--no-clear-queue", "-n"];
const CLEAR_FLAGS: [&str; 3] = ["-c", "--clear", "--clear-all"];
const FORCE_RANDOMIZE: &str = "--force-randomize";
const NO_FORCE_RANDOMIZE: &str = "--no-force-randomize";

#[derive(Clone, Debug, PartialEq)]
pub enum MusicCommand {
    /// Joins the caller's channel, or the voice channel with the given id
    Join(Option<u64>),
    Add(String),
    Play,
    Skip,
    Pause,
    /// Already clamped to the supported range
    Volume(f32),
    Queue,
    /// `None` asks about the song that is playing
    Info(Option<usize>),
    Playing,
    Stop { clear_queue: bool },
    Load { name: String, randomize: Randomize },
    Remove(RemoveTarget),
}

/// Caller override of a playlist's own `randomize` setting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Randomize {
    AsStored,
    Force,
    Suppress,
}

impl Randomize {
    pub fn apply(self, stored: bool) -> bool {
        match self {
            Randomize::AsStored => stored,
            Randomize::Force => true,
            Randomize::Suppress => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveTarget {
    Index(usize),
    All,
}

/// Drops every guard token from `args`.  Returns `None` when the guard is required but absent.
pub fn strip_guard<'a>(args: &[&'a str], guard_flag: &str, required: bool) -> Option<Vec<&'a str>> {
    let stripped: Vec<&str> = args
        .iter()
        .copied()
        .filter(|arg| *arg != guard_flag)
        .collect();

    if required && stripped.len() == args.len() {
        return None;
    }
    Some(stripped)
}

/// 1-based queue index.  Integers below 1 map to 0 so the queue reports them as out of range.
fn parse_index(raw: &str) -> MusicResult<usize> {
    raw.parse::<i64>()
        .map(|index| usize::try_from(index).unwrap_or(0))
        .map_err(|_| MusicError::NotANumber(raw.to_owned()))
}

impl MusicCommand {
    /// Parses the words following `music`.
    pub fn parse(args: &[&str]) -> MusicResult<Self> {
        let Some((subcommand, rest)) = args.split_first() else {
            return Err(MusicError::UnknownSubcommand);
        };

        match *subcommand {
            "join" => rest
                .first()
                .map(|raw| {
                    raw.parse::<u64>()
                        .map_err(|_| MusicError::NotANumber((*raw).to_owned()))
                })
                .transpose()
                .map(MusicCommand::Join),
            "add" => match rest.join(" ") {
                reference if reference.is_empty() => Err(MusicError::MissingArgument("reference")),
                reference => Ok(MusicCommand::Add(reference)),
            },
            "play" => Ok(MusicCommand::Play),
            "skip" => Ok(MusicCommand::Skip),
            "pause" => Ok(MusicCommand::Pause),
            "volume" => {
                let raw = rest.first().ok_or(MusicError::MissingArgument("volume"))?;
                let volume = raw
                    .parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| MusicError::NotANumber((*raw).to_owned()))?;
                Ok(MusicCommand::Volume(volume.clamp(MIN_VOLUME, MAX_VOLUME)))
            }
            "queue" => Ok(MusicCommand::Queue),
            "info" => rest
                .first()
                .map(|raw| parse_index(raw))
                .transpose()
                .map(MusicCommand::Info),
            "playing" => Ok(MusicCommand::Playing),
            "stop" | "exit" | "quit" => Ok(MusicCommand::Stop {
                clear_queue: !rest.iter().any(|arg| NO_CLEAR_QUEUE_FLAGS.contains(arg)),
            }),
            "load" => {
                let force = rest.contains(&FORCE_RANDOMIZE);
                let suppress = rest.contains(&NO_FORCE_RANDOMIZE);
                let randomize = match (force, suppress) {
                    (true, true) => {
                        return Err(MusicError::ConflictingFlags(
                            FORCE_RANDOMIZE,
                            NO_FORCE_RANDOMIZE,
                        ))
                    }
                    (true, false) => Randomize::Force,
                    (false, true) => Randomize::Suppress,
                    (false, false) => Randomize::AsStored,
                };

                let name = rest
                    .iter()
                    .find(|arg| **arg != FORCE_RANDOMIZE && **arg != NO_FORCE_RANDOMIZE)
                    .ok_or(MusicError::MissingArgument("playlist"))?;

                Ok(MusicCommand::Load {
                    name: (*name).to_owned(),
                    randomize,
                })
            }
            "remove" => {
                let raw = rest.first().ok_or(MusicError::MissingArgument("index"))?;
                if CLEAR_FLAGS.contains(raw) {
                    return Ok(MusicCommand::Remove(RemoveTarget::All));
                }
                parse_index(raw).map(|index| MusicCommand::Remove(RemoveTarget::Index(index)))
            }
            _ => Err(MusicError::UnknownSubcommand),
        }
    }
}

/// Chat reply for a line that failed to parse
pub fn parse_failure_reply(subcommand: Option<&str>, err: &MusicError) -> String {
    match (subcommand, err) {
        (Some("volume"), MusicError::MissingArgument(_)) => {
            "New volume not supplied. See command help for help.".to_owned()
        }
        (Some("volume"), MusicError::NotANumber(raw)) => {
            format!("That's not a float. (got: {})", raw)
        }
        (Some("info"), MusicError::NotANumber(raw)) => {
            format!("cannot get song info: noninteger queue index (got: {})", raw)
        }
        (Some("load"), MusicError::ConflictingFlags(first, second)) => format!(
            "exception: both {} and {} passed as arguments",
            first, second
        ),
        (Some("load"), MusicError::MissingArgument(_)) => {
            "cannot load playlist: no playlist specified. See command help for help.".to_owned()
        }
        (Some("remove"), MusicError::MissingArgument(_)) => {
            "argument error: no queue index to remove".to_owned()
        }
        (Some("remove"), MusicError::NotANumber(raw)) => format!(
            "cannot remove song from queue: invalid integer index (got: {})",
            raw
        ),
        (Some("join"), MusicError::NotANumber(raw)) => {
            format!("cannot join channel: invalid channel id (got: {})", raw)
        }
        (Some("add"), MusicError::MissingArgument(_)) => {
            "cannot add song: no reference given. See command help for help.".to_owned()
        }
        _ => "Unknown subcommand (see command help for available subcommands)".to_owned(),
    }
}
