// tests/property_log.rs

use proptest::prelude::*;
use time::OffsetDateTime;

use setup_runner::log::{LogHistory, LogLevel, LogMessage};

fn level_strategy() -> impl Strategy<Value = LogLevel> {
    proptest::sample::select(LogLevel::ALL.to_vec())
}

fn message(seq: u64, level: LogLevel) -> LogMessage {
    LogMessage {
        seq,
        timestamp: OffsetDateTime::UNIX_EPOCH,
        level,
        tag: "p".to_string(),
        text: seq.to_string(),
    }
}

fn history_of(levels: &[LogLevel], capacity: usize) -> LogHistory {
    let mut history = LogHistory::new(capacity);
    for (seq, level) in levels.iter().enumerate() {
        history.push(message(seq as u64, *level));
    }
    history
}

proptest! {
    #[test]
    fn history_keeps_the_newest_n(
        levels in proptest::collection::vec(level_strategy(), 0..200),
        capacity in 1usize..50,
    ) {
        let history = history_of(&levels, capacity);
        let expected = levels.len().min(capacity);
        prop_assert_eq!(history.len(), expected);

        let seqs: Vec<u64> = history.iter().map(|m| m.seq).collect();
        let first = (levels.len() - expected) as u64;
        let want: Vec<u64> = (first..levels.len() as u64).collect();
        prop_assert_eq!(seqs, want);
    }

    #[test]
    fn raising_the_threshold_never_adds_messages(
        levels in proptest::collection::vec(level_strategy(), 0..100),
        a in level_strategy(),
        b in level_strategy(),
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let history = history_of(&levels, 1_000);

        let at_low: Vec<u64> = history.filter(low).iter().map(|m| m.seq).collect();
        let at_high: Vec<u64> = history.filter(high).iter().map(|m| m.seq).collect();

        prop_assert!(at_high.iter().all(|s| at_low.contains(s)));
        prop_assert!(at_low.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(at_high.windows(2).all(|w| w[0] < w[1]));
        for m in history.filter(high) {
            prop_assert!(m.level >= high);
        }
    }

    #[test]
    fn formatted_lines_are_single_physical_lines(text in "(?s).{0,40}") {
        let mut m = message(0, LogLevel::Info);
        m.text = text;
        let line = m.format_line();
        prop_assert!(!line.contains(['\n', '\r']));
    }
}
