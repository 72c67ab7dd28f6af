/// Completion kinds that move the discipline score. The score has no cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisciplineEvent {
    Task,
    Quest,
    FocusSession,
    BossChallenge,
    Learning,
    FailedExam,
}

pub const STARTING_DISCIPLINE: i64 = 50;

impl DisciplineEvent {
    pub fn points(self) -> i64 {
        match self {
            Self::Task | Self::Quest => 1,
            Self::FocusSession => 2,
            Self::BossChallenge => 5,
            Self::Learning | Self::FailedExam => 0,
        }
    }

    pub fn apply(self, score: i64) -> i64 {
        score.saturating_add(self.points())
    }
}

#[cfg(test)]
mod tests {
    use super::{DisciplineEvent, STARTING_DISCIPLINE};

    #[test]
    fn completions_raise_score_without_cap() {
        let score = [
            DisciplineEvent::Task,
            DisciplineEvent::BossChallenge,
            DisciplineEvent::FocusSession,
            DisciplineEvent::Learning,
        ]
        .into_iter()
        .fold(STARTING_DISCIPLINE, |score, event| event.apply(score));

        assert_eq!(score, 58);
        assert_eq!(DisciplineEvent::BossChallenge.apply(1_000), 1_005);
    }
}
