pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  id                    TEXT PRIMARY KEY,
  username              TEXT NOT NULL,
  email                 TEXT NOT NULL UNIQUE,
  password_hash         TEXT NOT NULL,
  password_salt         TEXT NOT NULL,
  xp                    INTEGER NOT NULL DEFAULT 0,
  level                 INTEGER NOT NULL DEFAULT 1,
  current_streak        INTEGER NOT NULL DEFAULT 0,
  longest_streak        INTEGER NOT NULL DEFAULT 0,
  last_active_date      TEXT,
  discipline_score      INTEGER NOT NULL DEFAULT 50,
  total_tasks_completed INTEGER NOT NULL DEFAULT 0,
  created_at            INTEGER NOT NULL
);
"#;

pub const CREATE_SESSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
  token_hash TEXT PRIMARY KEY,
  user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  created_at INTEGER NOT NULL,
  expires_at INTEGER NOT NULL
);
"#;

pub const CREATE_TASKS: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
  id                TEXT PRIMARY KEY,
  user_id           TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  title             TEXT NOT NULL,
  description       TEXT NOT NULL DEFAULT '',
  skill_tree        TEXT NOT NULL DEFAULT 'General',
  difficulty        INTEGER NOT NULL DEFAULT 1,
  estimated_minutes INTEGER NOT NULL DEFAULT 30,
  xp_reward         INTEGER NOT NULL,
  completed         INTEGER NOT NULL DEFAULT 0,
  completed_at      INTEGER,
  created_at        INTEGER NOT NULL
);
"#;

pub const CREATE_FOCUS_SESSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS focus_sessions (
  id               TEXT PRIMARY KEY,
  user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  task_id          TEXT,
  duration_minutes INTEGER NOT NULL,
  completed        INTEGER NOT NULL DEFAULT 0,
  xp_earned        INTEGER NOT NULL DEFAULT 0,
  started_at       INTEGER NOT NULL,
  completed_at     INTEGER
);
"#;

pub const CREATE_BOSS_CHALLENGES: &str = r#"
CREATE TABLE IF NOT EXISTS boss_challenges (
  id             TEXT PRIMARY KEY,
  user_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  date           TEXT NOT NULL,
  challenge_text TEXT NOT NULL,
  difficulty     INTEGER NOT NULL,
  xp_reward      INTEGER NOT NULL,
  completed      INTEGER NOT NULL DEFAULT 0,
  completed_at   INTEGER,
  UNIQUE(user_id, date)
);
"#;

pub const CREATE_BOSS_EXAMS: &str = r#"
CREATE TABLE IF NOT EXISTS boss_exams (
  id           TEXT PRIMARY KEY,
  user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  challenge_id TEXT NOT NULL REFERENCES boss_challenges(id) ON DELETE CASCADE,
  answer_key   TEXT NOT NULL,
  submitted    INTEGER NOT NULL DEFAULT 0,
  score        REAL,
  grade        TEXT,
  created_at   INTEGER NOT NULL,
  submitted_at INTEGER
);
"#;

pub const CREATE_QUESTS: &str = r#"
CREATE TABLE IF NOT EXISTS quests (
  id           TEXT PRIMARY KEY,
  user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  quest_type   TEXT NOT NULL,
  title        TEXT NOT NULL,
  description  TEXT NOT NULL DEFAULT '',
  category     TEXT NOT NULL,
  difficulty   TEXT NOT NULL,
  xp_reward    INTEGER NOT NULL,
  questions    TEXT NOT NULL DEFAULT '[]',
  completed    INTEGER NOT NULL DEFAULT 0,
  xp_earned    INTEGER NOT NULL DEFAULT 0,
  created_at   INTEGER NOT NULL,
  expires_at   INTEGER,
  completed_at INTEGER
);
"#;

pub const CREATE_LEARNING_CONTENT: &str = r#"
CREATE TABLE IF NOT EXISTS learning_content (
  id                TEXT PRIMARY KEY,
  title             TEXT NOT NULL,
  description       TEXT NOT NULL DEFAULT '',
  category          TEXT NOT NULL,
  difficulty        TEXT NOT NULL,
  estimated_minutes INTEGER NOT NULL,
  url               TEXT
);
"#;

pub const CREATE_LEARNING_COMPLETIONS: &str = r#"
CREATE TABLE IF NOT EXISTS learning_completions (
  id           INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  content_id   TEXT NOT NULL REFERENCES learning_content(id) ON DELETE CASCADE,
  xp_earned    INTEGER NOT NULL,
  completed_at INTEGER NOT NULL,
  UNIQUE(user_id, content_id)
);
"#;

pub const CREATE_ACHIEVEMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS achievements (
  user_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  achievement_id TEXT NOT NULL,
  unlocked_at    INTEGER NOT NULL,
  PRIMARY KEY (user_id, achievement_id)
);
"#;

pub const CREATE_CHAT_HISTORY: &str = r#"
CREATE TABLE IF NOT EXISTS chat_history (
  id         INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  role       TEXT NOT NULL,
  content    TEXT NOT NULL,
  created_at INTEGER NOT NULL
);
"#;

pub const INDEX_TASKS_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id, completed);";

pub const INDEX_FOCUS_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_focus_sessions_user ON focus_sessions(user_id, started_at);";

pub const INDEX_QUESTS_USER_TYPE: &str =
    "CREATE INDEX IF NOT EXISTS idx_quests_user_type ON quests(user_id, quest_type);";

pub const INDEX_CHAT_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_chat_history_user ON chat_history(user_id, id);";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_USERS,
        CREATE_SESSIONS,
        CREATE_TASKS,
        CREATE_FOCUS_SESSIONS,
        CREATE_BOSS_CHALLENGES,
        CREATE_BOSS_EXAMS,
        CREATE_QUESTS,
        CREATE_LEARNING_CONTENT,
        CREATE_LEARNING_COMPLETIONS,
        CREATE_ACHIEVEMENTS,
        CREATE_CHAT_HISTORY,
        INDEX_TASKS_USER,
        INDEX_FOCUS_USER,
        INDEX_QUESTS_USER_TYPE,
        INDEX_CHAT_USER,
    ]
}
