use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

pub const FOCUS_XP_PER_MINUTE: u64 = 2;
pub const LEARNING_XP_PER_MINUTE: u64 = 2;
pub const BOSS_XP_PER_DIFFICULTY: u64 = 50;
pub const BOSS_MIN_DIFFICULTY: u32 = 3;
pub const BOSS_MAX_DIFFICULTY: u32 = 5;
pub const EXAM_PASS_SCORE: f64 = 50.0;
pub const EXAM_PASS_BONUS: u64 = 250;
pub const EXAM_QUESTION_COUNT: usize = 5;
pub const EXAM_CHOICES: [char; 4] = ['A', 'B', 'C', 'D'];

const SIMULATED_SCORE_FLOOR: f64 = 40.0;
const SIMULATED_SCORE_CEILING: f64 = 100.0;
const STREAK_MULTIPLIER_CAP_TENTHS: u64 = 30;

pub const BOSS_CHALLENGES: [&str; 10] = [
    "Complete 5 tasks without distraction",
    "Work for 2 hours straight in Focus Mode",
    "Finish your most difficult task today",
    "Complete all pending tasks from yesterday",
    "Learn something new and create a task about it",
    "Help someone else with their task",
    "Wake up early and complete 3 tasks before noon",
    "No social media until you complete 3 tasks",
    "Complete a task you've been procrastinating on",
    "Double your daily task completion rate",
];

/// How a task's reward is derived when the creator did not set one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRewardRule {
    /// `difficulty * 20 + estimated_minutes / 2`
    Flat,
    /// `(max(1, difficulty) * 20 + max(1, minutes) * 2) * min(1 + 0.1 * streak, 3)`
    StreakScaled,
}

impl TaskRewardRule {
    pub fn reward(self, difficulty: u32, estimated_minutes: u32, current_streak: u32) -> u64 {
        match self {
            Self::Flat => u64::from(difficulty) * 20 + u64::from(estimated_minutes) / 2,
            Self::StreakScaled => {
                let base = u64::from(difficulty.max(1)) * 20;
                let time_bonus = u64::from(estimated_minutes.max(1)) * 2;
                let tenths = (10 + u64::from(current_streak)).min(STREAK_MULTIPLIER_CAP_TENTHS);
                (base + time_bonus) * tenths / 10
            }
        }
    }
}

pub fn task_reward(
    rule: TaskRewardRule,
    explicit: Option<u64>,
    difficulty: u32,
    estimated_minutes: u32,
    current_streak: u32,
) -> u64 {
    explicit
        .filter(|value| *value > 0)
        .unwrap_or_else(|| rule.reward(difficulty, estimated_minutes, current_streak))
}

pub fn focus_reward(duration_minutes: u32) -> u64 {
    u64::from(duration_minutes) * FOCUS_XP_PER_MINUTE
}

pub fn learning_reward(estimated_minutes: u32) -> u64 {
    u64::from(estimated_minutes) * LEARNING_XP_PER_MINUTE
}

pub fn boss_challenge_reward(difficulty: u32) -> u64 {
    u64::from(difficulty) * BOSS_XP_PER_DIFFICULTY
}

/// Partial credit for scored quests. Quests without questions pay in full.
pub fn quest_reward(xp_reward: u64, correct_answers: u32, total_questions: u32) -> u64 {
    if total_questions == 0 {
        return xp_reward;
    }
    let correct = u64::from(correct_answers.min(total_questions));
    xp_reward * correct / u64::from(total_questions)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BossDraft {
    pub challenge_text: String,
    pub difficulty: u32,
    pub xp_reward: u64,
}

pub fn draw_boss_challenge<R: Rng + ?Sized>(rng: &mut R) -> BossDraft {
    let challenge_text = BOSS_CHALLENGES
        .choose(rng)
        .copied()
        .unwrap_or(BOSS_CHALLENGES[0])
        .to_string();
    let difficulty = rng.gen_range(BOSS_MIN_DIFFICULTY..=BOSS_MAX_DIFFICULTY);

    BossDraft {
        challenge_text,
        difficulty,
        xp_reward: boss_challenge_reward(difficulty),
    }
}

/// Shuffles one question's options. Returns them with the letter the correct
/// option landed on.
pub fn shuffle_choices<R: Rng + ?Sized>(
    rng: &mut R,
    correct: &str,
    distractors: &[&str],
) -> (Vec<String>, char) {
    let mut options = std::iter::once(correct)
        .chain(distractors.iter().copied())
        .take(EXAM_CHOICES.len())
        .map(str::to_string)
        .collect::<Vec<_>>();
    options.shuffle(rng);

    let key = options
        .iter()
        .position(|option| option == correct)
        .map(|index| EXAM_CHOICES[index])
        .unwrap_or(EXAM_CHOICES[0]);

    (options, key)
}

/// Answers matching the key, position by position. Missing answers count as wrong.
pub fn count_correct(key: &[char], answers: &[String]) -> usize {
    key.iter()
        .zip(answers.iter())
        .filter(|(expected, given)| {
            given
                .trim()
                .chars()
                .next()
                .is_some_and(|choice| choice.eq_ignore_ascii_case(*expected))
        })
        .count()
}

pub fn grade_answers(key: &[char], answers: &[String]) -> f64 {
    if key.is_empty() {
        return 0.0;
    }
    count_correct(key, answers) as f64 / key.len() as f64 * 100.0
}

pub fn simulate_exam_score<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(SIMULATED_SCORE_FLOOR..SIMULATED_SCORE_CEILING)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExamGrade {
    #[serde(rename = "A*")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl ExamGrade {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 95.0 => Self::APlus,
            s if s >= 85.0 => Self::A,
            s if s >= 70.0 => Self::B,
            s if s >= 50.0 => Self::C,
            s if s >= 40.0 => Self::D,
            _ => Self::F,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::APlus => "A*",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExamOutcome {
    pub score: f64,
    pub grade: ExamGrade,
    pub passed: bool,
    pub xp_gained: u64,
    pub xp_penalty: u64,
    pub extra_quests: u32,
}

impl ExamOutcome {
    pub fn from_score(score: f64) -> Self {
        let score = score.clamp(0.0, 100.0);
        let grade = ExamGrade::from_score(score);

        if score >= EXAM_PASS_SCORE {
            return Self {
                score,
                grade,
                passed: true,
                xp_gained: EXAM_PASS_BONUS,
                xp_penalty: 0,
                extra_quests: 0,
            };
        }

        let shortfall = EXAM_PASS_SCORE - score;
        Self {
            score,
            grade,
            passed: false,
            xp_gained: 0,
            xp_penalty: (shortfall * 10.0) as u64,
            extra_quests: ((shortfall / 10.0) as u32).max(1),
        }
    }

    pub fn xp_delta(&self) -> i64 {
        i64::try_from(self.xp_gained).unwrap_or(i64::MAX)
            - i64::try_from(self.xp_penalty).unwrap_or(i64::MAX)
    }
}
