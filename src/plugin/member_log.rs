//! Join and leave notices for the configured server, with a running member count log and an
//! optional auto-ban for spam accounts.

use crate::{config, event::*, log_info, log_warn, plugin::*};
use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use serenity::all::{
    ChannelId, CreateEmbed, CreateEmbedFooter, CreateMessage, GuildId, Member, Mentionable,
    Timestamp, User,
};
use std::path::Path;
use tokio::io::AsyncWriteExt;

const JOIN_COLOUR: u32 = 0x15a216;
const LEAVE_COLOUR: u32 = 0xcd5312;

pub struct MemberLog;

#[serenity::async_trait]
impl Plugin for MemberLog {
    fn name(&self) -> &'static str {
        "member_log"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some(settings) = ctx.cfg.read().await.member_log.clone() else {
            return Ok(EventHandled::No);
        };

        match event {
            Event::MemberJoin(member) if member.guild_id.get() == settings.guild_id => {
                member_joined(ctx, &settings, member).await?;
            }
            Event::MemberLeave {
                guild_id,
                user,
                member,
            } if guild_id.get() == settings.guild_id => {
                member_left(ctx, &settings, *guild_id, user, member.as_ref()).await?;
            }
            _ => {}
        }

        // Other plugins may still want membership events
        Ok(EventHandled::No)
    }
}

/// What the notices show about a member
struct MemberDetails {
    tag: String,
    id: String,
    mention: String,
    nickname: String,
    avatar: String,
    member_count: u64,
    joined_at: Option<DateTime<Utc>>,
}

impl MemberDetails {
    fn new(user: &User, member: Option<&Member>, member_count: u64) -> Self {
        Self {
            tag: user.tag(),
            id: user.id.to_string(),
            mention: user.mention().to_string(),
            nickname: member
                .map(|member| member.display_name().to_owned())
                .unwrap_or_else(|| user.display_name().to_owned()),
            avatar: user.face(),
            member_count,
            joined_at: member.and_then(|member| member.joined_at).and_then(to_utc),
        }
    }
}

fn to_utc(timestamp: Timestamp) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.unix_timestamp(), 0)
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// `3 days, 4:05:06`, or `4:05:06` when under a day
fn format_elapsed(elapsed: TimeDelta) -> String {
    let secs = elapsed.num_seconds().max(0);
    let (days, secs) = (secs / 86_400, secs % 86_400);
    let clock = format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60);

    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        days => format!("{} days, {}", days, clock),
    }
}

fn should_autoban(name: &str, pattern: Option<&str>) -> bool {
    pattern.is_some_and(|pattern| !pattern.is_empty() && name.contains(pattern))
}

fn join_embed(details: &MemberDetails) -> CreateEmbed {
    let embed = CreateEmbed::new()
        .title("Member has joined the server")
        .colour(JOIN_COLOUR)
        .thumbnail(&details.avatar)
        .field("Tag", &details.tag, true)
        .field("ID", &details.id, true)
        .field("Mention", &details.mention, true)
        .field("New Member Count", details.member_count.to_string(), true);

    match details.joined_at {
        Some(joined_at) => embed.footer(CreateEmbedFooter::new(format_time(joined_at))),
        None => embed,
    }
}

fn leave_embed(details: &MemberDetails, now: DateTime<Utc>) -> CreateEmbed {
    let member_since = match details.joined_at {
        Some(joined_at) => format!(
            "{} UTC ({})",
            format_time(joined_at),
            format_elapsed(now - joined_at)
        ),
        None => "<unknown>".to_owned(),
    };

    CreateEmbed::new()
        .title("Member has left the server")
        .colour(LEAVE_COLOUR)
        .thumbnail(&details.avatar)
        .field("Tag", &details.tag, true)
        .field("ID", &details.id, true)
        .field("Nickname", &details.nickname, true)
        .field("Mention", &details.mention, true)
        .field("New Member Count", details.member_count.to_string(), true)
        .field("Member since", member_since, true)
        .footer(CreateEmbedFooter::new(format_time(now)))
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(format!("{}\n", line).as_bytes()).await
}

async fn record_count(settings: &config::MemberLog, line: String) {
    if let Err(e) = append_line(&settings.members_log, &line).await {
        log_warn!(
            "Could not append to member log `{}`: {}",
            settings.members_log.to_string_lossy(),
            e
        );
    }
}

fn member_count(ctx: &Context, guild_id: GuildId) -> u64 {
    ctx.cache
        .guild(guild_id)
        .map_or(0, |guild| guild.member_count)
}

async fn member_joined(
    ctx: &Context<'_>,
    settings: &config::MemberLog,
    member: &Member,
) -> Result<()> {
    let notify = ChannelId::new(settings.notify_channel_id);

    if should_autoban(&member.user.name, settings.autoban_pattern.as_deref()) {
        let pattern = settings.autoban_pattern.as_deref().unwrap_or_default();
        let report = match member.ban(ctx.http, 0).await {
            Ok(()) => {
                log_info!("Autobanned {} ({})", member.user.name, member.user.id);
                format!(
                    "Successfully autobanned below user for \"{}\" in username.",
                    pattern
                )
            }
            Err(e) => {
                log_warn!("Could not autoban {}: {}", member.user.name, e);
                format!(
                    "Attempted to autoban user below for \"{}\" in username but failed!",
                    pattern
                )
            }
        };
        notify.say(ctx.cache_http, report).await?;
    }

    let count = member_count(ctx, member.guild_id);
    let details = MemberDetails::new(&member.user, Some(member), count);
    let joined_at = details.joined_at.unwrap_or_else(Utc::now);
    record_count(
        settings,
        format!("{}+{}", format_time(joined_at), details.member_count),
    )
    .await;

    notify
        .send_message(ctx.cache_http, CreateMessage::new().embed(join_embed(&details)))
        .await?;
    Ok(())
}

async fn member_left(
    ctx: &Context<'_>,
    settings: &config::MemberLog,
    guild_id: GuildId,
    user: &User,
    member: Option<&Member>,
) -> Result<()> {
    let now = Utc::now();
    let details = MemberDetails::new(user, member, member_count(ctx, guild_id));

    record_count(
        settings,
        format!("{}-{}", format_time(now), details.member_count),
    )
    .await;

    ChannelId::new(settings.notify_channel_id)
        .send_message(ctx.cache_http, CreateMessage::new().embed(leave_embed(&details, now)))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn details(joined_at: Option<DateTime<Utc>>) -> MemberDetails {
        MemberDetails {
            tag: "someone#0001".to_owned(),
            id: "42".to_owned(),
            mention: "<@42>".to_owned(),
            nickname: "Some One".to_owned(),
            avatar: "https://cdn.example/avatar.png".to_owned(),
            member_count: 130,
            joined_at,
        }
    }

    #[test]
    fn elapsed_time_reads_like_days_and_clock() {
        assert_eq!(format_elapsed(TimeDelta::seconds(59)), "0:00:59");
        assert_eq!(format_elapsed(TimeDelta::seconds(86_400 + 3_723)), "1 day, 1:02:03");
        assert_eq!(format_elapsed(TimeDelta::days(400)), "400 days, 0:00:00");
    }

    #[test]
    fn autoban_needs_a_configured_pattern() {
        assert!(should_autoban("join discord.gg/spam", Some("discord.gg")));
        assert!(!should_autoban("regular user", Some("discord.gg")));
        assert!(!should_autoban("discord.gg", None));
        assert!(!should_autoban("anyone", Some("")));
    }

    #[test]
    fn leave_notice_reports_membership_length() {
        let joined = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 6, 30, 0).unwrap();

        let json = serde_json::to_value(leave_embed(&details(Some(joined)), now)).unwrap();

        assert_eq!(json["title"], "Member has left the server");
        assert_eq!(json["color"], LEAVE_COLOUR);
        assert_eq!(json["fields"][2]["value"], "Some One");
        assert_eq!(
            json["fields"][5]["value"],
            "2024-01-01 00:00:00.000000 UTC (2 days, 6:30:00)"
        );
        assert_eq!(json["footer"]["text"], "2024-01-03 06:30:00.000000");
    }

    #[test]
    fn join_notice_lists_member() {
        let json = serde_json::to_value(join_embed(&details(None))).unwrap();

        assert_eq!(json["title"], "Member has joined the server");
        assert_eq!(json["fields"][3]["name"], "New Member Count");
        assert_eq!(json["fields"][3]["value"], "130");
    }

    #[tokio::test]
    async fn count_lines_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("members.log");

        append_line(&path, "2024-01-01 00:00:00.000000+5").await.unwrap();
        append_line(&path, "2024-01-02 00:00:00.000000-4").await.unwrap();

        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            "2024-01-01 00:00:00.000000+5\n2024-01-02 00:00:00.000000-4\n"
        );
    }
}
