use super::song::{format_duration, Song};
use chrono::{DateTime, Utc};
use serenity::all::{CreateEmbed, CreateEmbedFooter};

pub const SONG_COLOUR: u32 = 0xbf35e3;
const QUEUE_LIST_LIMIT: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SongHeading {
    NowPlaying,
    Info { position: Option<usize> },
}

fn footer(now: DateTime<Utc>) -> CreateEmbedFooter {
    CreateEmbedFooter::new(now.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
}

pub fn song_embed(song: &Song, heading: SongHeading, now: DateTime<Utc>) -> CreateEmbed {
    let embed = match heading {
        SongHeading::NowPlaying => CreateEmbed::new().title("Now Playing"),
        SongHeading::Info { position } => {
            let embed = CreateEmbed::new().title("Song Info");
            match position {
                Some(position) => embed.description(format!("Queue position {}", position)),
                None => embed,
            }
        }
    };

    let duration =
        format_duration(song.duration_secs()).unwrap_or_else(|| "<length unknown>".to_owned());

    embed
        .colour(SONG_COLOUR)
        .field("Title", song.title(), true)
        .field("Reference", song.reference(), true)
        .field("Duration", duration, true)
        .field("Requester", song.requester(), true)
        .footer(footer(now))
}

/// The next few queue entries, one per line
pub fn queue_list(queue: &[Song]) -> String {
    let shown = queue.len().min(QUEUE_LIST_LIMIT);
    let mut list = format!("Next {} items in queue:\n", shown);

    for (i, song) in queue.iter().take(shown).enumerate() {
        let position = i + 1;
        let duration =
            format_duration(song.duration_secs()).unwrap_or_else(|| "length unknown".to_owned());
        let number = if queue.len() > 9 {
            format!("{:02}", position)
        } else {
            position.to_string()
        };

        list.push_str(&format!(
            "`{}:` {} ({}) (requested by {})\n",
            number,
            song.title(),
            duration,
            song.requester()
        ));
    }

    list
}

pub fn queue_embed(queue: &[Song], now_playing: Option<&Song>, now: DateTime<Utc>) -> CreateEmbed {
    CreateEmbed::new()
        .title("Upcoming Music Queue")
        .description(queue_list(queue))
        .field(
            "Currently Playing",
            now_playing.map_or("<no song playing>", Song::title),
            false,
        )
        .footer(footer(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::music::song::ResolvedSong;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn resolved(title: &str, duration_secs: u64) -> Song {
        ResolvedSong {
            reference: format!("ref-{}", title),
            requester: "<@1>".to_owned(),
            title: title.to_owned(),
            duration_secs,
            stream_url: String::new(),
        }
        .into()
    }

    #[test]
    fn short_queue_lists_every_song() {
        let queue = vec![resolved("A", 187), Song::unresolved("ref-b", "<@2>")];

        assert_eq!(
            queue_list(&queue),
            "Next 2 items in queue:\n\
             `1:` A (3m7s) (requested by <@1>)\n\
             `2:` <song data not loaded> (length unknown) (requested by <@2>)\n"
        );
    }

    #[test]
    fn long_queue_is_truncated_and_zero_padded() {
        let queue: Vec<Song> = (0..25).map(|i| resolved(&format!("S{}", i), 60)).collect();

        let list = queue_list(&queue);
        let lines: Vec<&str> = list.lines().collect();

        assert_eq!(lines.len(), 21);
        assert_eq!(lines[0], "Next 20 items in queue:");
        assert!(lines[1].starts_with("`01:` S0 "));
        assert!(lines[20].starts_with("`20:` S19 "));
    }

    #[test]
    fn song_embed_carries_details() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let embed = song_embed(
            &resolved("A", 0),
            SongHeading::Info { position: Some(3) },
            now,
        );

        let json = serde_json::to_value(&embed).unwrap();

        assert_eq!(json["title"], "Song Info");
        assert_eq!(json["description"], "Queue position 3");
        assert_eq!(json["color"], SONG_COLOUR);
        assert_eq!(json["fields"][2]["value"], "<length unknown>");
        assert_eq!(json["footer"]["text"], "2024-01-02 03:04:05.000000");
    }

    #[test]
    fn queue_embed_without_current_song() {
        let now = Utc::now();
        let json = serde_json::to_value(queue_embed(&[], None, now)).unwrap();

        assert_eq!(json["title"], "Upcoming Music Queue");
        assert_eq!(json["fields"][0]["value"], "<no song playing>");
    }
}
