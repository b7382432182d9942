//! Tests for Telegram bot functionality
//!
//! Unit tests for command parsing and the formatting helpers used by the
//! `/info` card.

#[cfg(test)]
mod tests {
    mod duration_formatting {
        use crate::telegram::format_duration;

        #[test]
        fn zero_is_all_zeros() {
            assert_eq!(format_duration(0), "00:00:00");
        }

        #[test]
        fn seconds_only() {
            assert_eq!(format_duration(59), "00:00:59");
        }

        #[test]
        fn minutes_and_seconds() {
            assert_eq!(format_duration(212), "00:03:32");
        }

        #[test]
        fn hours_roll_over() {
            assert_eq!(format_duration(3661), "01:01:01");
            assert_eq!(format_duration(10 * 3600), "10:00:00");
        }

        #[test]
        fn long_durations_keep_counting_hours() {
            assert_eq!(format_duration(100 * 3600 + 61), "100:01:01");
        }
    }

    mod view_count_formatting {
        use crate::telegram::format_view_count;

        #[test]
        fn small_counts_unchanged() {
            assert_eq!(format_view_count(0), "0");
            assert_eq!(format_view_count(999), "999");
        }

        #[test]
        fn thousands_get_separators() {
            assert_eq!(format_view_count(1_000), "1,000");
            assert_eq!(format_view_count(1_234_567), "1,234,567");
        }

        #[test]
        fn boundary_values() {
            assert_eq!(format_view_count(100_000), "100,000");
            assert_eq!(format_view_count(999_999), "999,999");
        }
    }

    mod command_parsing {
        use crate::telegram::Command;
        use teloxide::utils::command::BotCommands;

        #[test]
        fn audio_takes_url_argument() {
            let cmd = Command::parse("/audio https://youtu.be/abc", "tunebot").unwrap();
            match cmd {
                Command::Audio(url) => assert_eq!(url, "https://youtu.be/abc"),
                other => panic!("unexpected command: {:?}", other),
            }
        }

        #[test]
        fn audio_without_argument_parses_empty() {
            let cmd = Command::parse("/audio", "tunebot").unwrap();
            match cmd {
                Command::Audio(url) => assert!(url.is_empty()),
                other => panic!("unexpected command: {:?}", other),
            }
        }

        #[test]
        fn info_takes_url_argument() {
            let cmd = Command::parse("/info https://youtube.com/watch?v=x", "tunebot").unwrap();
            match cmd {
                Command::Info(url) => assert_eq!(url, "https://youtube.com/watch?v=x"),
                other => panic!("unexpected command: {:?}", other),
            }
        }

        #[test]
        fn unknown_command_is_rejected() {
            assert!(Command::parse("/frobnicate", "tunebot").is_err());
        }
    }
}
