use crate::game::PlayerKey;
use crate::grid::Position;
use std::fmt;

/// One line of a replay. Records are kept structured and only turned into
/// text at the boundary.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ReplayRecord {
    Width(usize),
    Height(usize),
    Player { key: PlayerKey, at: Position },
    Wall(Position),
    Pill(Position),
    Fruit(Position),
    Time { remaining: u32, score: u32 },
}

impl fmt::Display for ReplayRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayRecord::Width(w) => write!(f, "{}", w),
            ReplayRecord::Height(h) => write!(f, "{}", h),
            ReplayRecord::Player { key, at } => write!(f, "{} {} {}", key, at.x, at.y),
            ReplayRecord::Wall(p) => write!(f, "w {} {}", p.x, p.y),
            ReplayRecord::Pill(p) => write!(f, "p {} {}", p.x, p.y),
            ReplayRecord::Fruit(p) => write!(f, "f {} {}", p.x, p.y),
            ReplayRecord::Time { remaining, score } => write!(f, "t {} {}", remaining, score),
        }
    }
}

/// Append-only trace of a single game.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ReplayLog {
    records: Vec<ReplayRecord>,
}

impl ReplayLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: ReplayRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ReplayRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of `t` snapshots after the setup one, i.e. ticks played.
    pub fn ticks(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r, ReplayRecord::Time { .. }))
            .count()
            .saturating_sub(1)
    }

    pub fn lines(&self) -> Vec<String> {
        self.records.iter().map(|r| r.to_string()).collect()
    }
}

impl fmt::Display for ReplayLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "{}", record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_use_literal_tags() {
        let p = Position::new(3, 4);
        assert_eq!(ReplayRecord::Width(7).to_string(), "7");
        assert_eq!(ReplayRecord::Wall(p).to_string(), "w 3 4");
        assert_eq!(ReplayRecord::Pill(p).to_string(), "p 3 4");
        assert_eq!(ReplayRecord::Fruit(p).to_string(), "f 3 4");
        assert_eq!(
            ReplayRecord::Time {
                remaining: 12,
                score: 55
            }
            .to_string(),
            "t 12 55"
        );
    }

    #[test]
    fn player_keys_on_the_wire() {
        let at = Position::new(0, 2);
        let line = |key| ReplayRecord::Player { key, at }.to_string();
        assert_eq!(line(PlayerKey::Pursued(0)), "m 0 2");
        assert_eq!(line(PlayerKey::Pursued(1)), "m0 0 2");
        assert_eq!(line(PlayerKey::Pursued(2)), "m1 0 2");
        assert_eq!(line(PlayerKey::Pursuer(0)), "0 0 2");
        assert_eq!(line(PlayerKey::Pursuer(2)), "2 0 2");
    }

    #[test]
    fn text_is_one_record_per_line() {
        let mut log = ReplayLog::new();
        log.push(ReplayRecord::Width(2));
        log.push(ReplayRecord::Height(1));
        log.push(ReplayRecord::Time {
            remaining: 4,
            score: 0,
        });
        log.push(ReplayRecord::Time {
            remaining: 3,
            score: 0,
        });

        assert_eq!(log.to_string(), "2\n1\nt 4 0\nt 3 0\n");
        assert_eq!(log.lines(), vec!["2", "1", "t 4 0", "t 3 0"]);
        assert_eq!(log.ticks(), 1);
    }
}
