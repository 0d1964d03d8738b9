//! Works out which voice connection a command refers to.

use super::error::{MusicError, MusicResult};
use crate::log_warn;
use serenity::all::{Cache, ChannelId, ChannelType, GuildId, UserId};

/// Whose voice channel a caller means
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceTarget {
    /// The channel the member is sitting in
    Member { guild_id: GuildId, user_id: UserId },
    /// The channel the bot is connected to in this guild
    Guild(GuildId),
    Channel { guild_id: GuildId, channel_id: ChannelId },
    /// An id of unknown kind, checked against guilds first and then voice channels
    Raw(u64),
}

/// A voice channel the bot is currently connected to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveConnection {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

/// Voice state lookups the resolver needs
pub trait VoiceDirectory {
    fn member_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId>;
    fn bot_channel(&self, guild_id: GuildId) -> Option<ChannelId>;
    fn is_guild(&self, id: u64) -> bool;
    /// Guild owning `channel_id`, if it is a known voice channel
    fn voice_channel_guild(&self, channel_id: ChannelId) -> Option<GuildId>;
}

pub fn resolve<D: VoiceDirectory + ?Sized>(
    directory: &D,
    target: VoiceTarget,
) -> MusicResult<ActiveConnection> {
    let (guild_id, channel_id) = match target {
        VoiceTarget::Member { guild_id, user_id } => {
            (guild_id, directory.member_channel(guild_id, user_id))
        }
        VoiceTarget::Guild(guild_id) => (guild_id, directory.bot_channel(guild_id)),
        VoiceTarget::Channel {
            guild_id,
            channel_id,
        } => (guild_id, Some(channel_id)),
        VoiceTarget::Raw(id) => {
            log_warn!("Voice target given as raw id {}; resolving on a best-effort basis", id);
            if id == 0 {
                return Err(MusicError::UnknownChannel);
            }
            if directory.is_guild(id) {
                return resolve(directory, VoiceTarget::Guild(GuildId::new(id)));
            }
            let channel_id = ChannelId::new(id);
            return match directory.voice_channel_guild(channel_id) {
                Some(guild_id) => resolve(
                    directory,
                    VoiceTarget::Channel {
                        guild_id,
                        channel_id,
                    },
                ),
                None => Err(MusicError::UnknownChannel),
            };
        }
    };

    let channel_id = channel_id.ok_or(MusicError::UnknownChannel)?;

    if directory.bot_channel(guild_id) != Some(channel_id) {
        return Err(MusicError::NotConnected);
    }

    Ok(ActiveConnection {
        guild_id,
        channel_id,
    })
}

pub fn caller_in<D: VoiceDirectory + ?Sized>(
    directory: &D,
    connection: &ActiveConnection,
    user_id: UserId,
) -> bool {
    directory.member_channel(connection.guild_id, user_id) == Some(connection.channel_id)
}

/// Outcome of a `join` request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinPlan {
    /// Neither the caller nor the bot is in a voice channel
    Ambiguous,
    /// The caller is not in a voice channel but the bot already is
    AlreadyConnectedElsewhere,
    /// The bot is in a different channel of the caller's guild
    Busy,
    AlreadyHere,
    Connect(ChannelId),
}

pub fn plan_join<D: VoiceDirectory + ?Sized>(
    directory: &D,
    guild_id: GuildId,
    user_id: UserId,
) -> JoinPlan {
    match resolve(directory, VoiceTarget::Member { guild_id, user_id }) {
        Ok(_) => JoinPlan::AlreadyHere,
        Err(MusicError::NotConnected) => match directory.bot_channel(guild_id) {
            Some(_) => JoinPlan::Busy,
            None => match directory.member_channel(guild_id, user_id) {
                Some(channel_id) => JoinPlan::Connect(channel_id),
                None => JoinPlan::Ambiguous,
            },
        },
        Err(_) => match resolve(directory, VoiceTarget::Guild(guild_id)) {
            Ok(_) => JoinPlan::AlreadyConnectedElsewhere,
            Err(_) => JoinPlan::Ambiguous,
        },
    }
}

/// Outcome of a `join` naming a channel (or server) id.  Only voice channels of `guild_id` can be
/// joined.
pub fn plan_join_id<D: VoiceDirectory + ?Sized>(
    directory: &D,
    guild_id: GuildId,
    id: u64,
) -> JoinPlan {
    match resolve(directory, VoiceTarget::Raw(id)) {
        Ok(connection) if connection.guild_id == guild_id => JoinPlan::AlreadyHere,
        Ok(_) | Err(MusicError::UnknownChannel) => JoinPlan::Ambiguous,
        Err(_) if directory.bot_channel(guild_id).is_some() => JoinPlan::Busy,
        Err(_) => {
            let channel_id = ChannelId::new(id);
            match directory.voice_channel_guild(channel_id) {
                Some(owner) if owner == guild_id => JoinPlan::Connect(channel_id),
                _ => JoinPlan::Ambiguous,
            }
        }
    }
}

/// Voice lookups backed by the serenity cache
pub struct CacheDirectory<'a> {
    pub cache: &'a Cache,
    pub bot_id: UserId,
}

impl VoiceDirectory for CacheDirectory<'_> {
    fn member_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        self.cache
            .guild(guild_id)?
            .voice_states
            .get(&user_id)
            .and_then(|state| state.channel_id)
    }

    fn bot_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.member_channel(guild_id, self.bot_id)
    }

    fn is_guild(&self, id: u64) -> bool {
        id != 0 && self.cache.guild(GuildId::new(id)).is_some()
    }

    fn voice_channel_guild(&self, channel_id: ChannelId) -> Option<GuildId> {
        self.cache.guilds().into_iter().find(|guild_id| {
            self.cache.guild(*guild_id).is_some_and(|guild| {
                guild
                    .channels
                    .get(&channel_id)
                    .is_some_and(|channel| channel.kind == ChannelType::Voice)
            })
        })
    }
}
