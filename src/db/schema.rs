pub const SCHEMA_VERSION: &str = "1";

pub const SQLITE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS "_db_metadata" (
    "key" TEXT PRIMARY KEY,
    "value" TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "vocabulary_progress" (
    "learnerId" TEXT NOT NULL,
    "vocabularyId" TEXT NOT NULL,
    "totalAttempts" INTEGER NOT NULL DEFAULT 0,
    "correctAttempts" INTEGER NOT NULL DEFAULT 0,
    "recognitionAttempts" INTEGER NOT NULL DEFAULT 0,
    "recognitionCorrect" INTEGER NOT NULL DEFAULT 0,
    "multipleChoiceCorrect" INTEGER NOT NULL DEFAULT 0,
    "masteryScore" REAL NOT NULL DEFAULT 0,
    "currentPhase" TEXT NOT NULL DEFAULT 'Recognition',
    "currentStreak" INTEGER NOT NULL DEFAULT 0,
    "productionInStreak" INTEGER NOT NULL DEFAULT 0,
    "easeFactor" REAL NOT NULL DEFAULT 2.5,
    "reviewInterval" INTEGER NOT NULL DEFAULT 1,
    -- epoch milliseconds
    "nextReviewAt" INTEGER,
    "lastPracticedAt" INTEGER,
    "updatedAt" INTEGER NOT NULL,
    PRIMARY KEY ("learnerId", "vocabularyId")
);

CREATE INDEX IF NOT EXISTS "idx_vocabulary_progress_due"
    ON "vocabulary_progress" ("learnerId", "nextReviewAt");

CREATE TABLE IF NOT EXISTS "daily_plans" (
    "learnerId" TEXT NOT NULL,
    "planDate" TEXT NOT NULL,
    "generatedAt" INTEGER NOT NULL,
    "source" TEXT NOT NULL,
    "rationale" TEXT NOT NULL DEFAULT '',
    "activities" TEXT NOT NULL,
    PRIMARY KEY ("learnerId", "planDate")
);

CREATE TABLE IF NOT EXISTS "plan_activity_progress" (
    "learnerId" TEXT NOT NULL,
    "planDate" TEXT NOT NULL,
    "activityId" TEXT NOT NULL,
    "minutesSpent" INTEGER NOT NULL DEFAULT 0,
    "isCompleted" INTEGER NOT NULL DEFAULT 0,
    "updatedAt" INTEGER NOT NULL,
    PRIMARY KEY ("learnerId", "planDate", "activityId")
);

CREATE TABLE IF NOT EXISTS "activity_log" (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "learnerId" TEXT NOT NULL,
    "occurredAt" INTEGER NOT NULL,
    "activityType" TEXT NOT NULL,
    "resourceId" TEXT,
    "skillId" TEXT,
    "title" TEXT,
    "minutesSpent" INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS "idx_activity_log_learner"
    ON "activity_log" ("learnerId", "occurredAt");

CREATE TABLE IF NOT EXISTS "learning_resources" (
    "id" TEXT PRIMARY KEY,
    "title" TEXT NOT NULL,
    "mediaType" TEXT NOT NULL,
    "language" TEXT NOT NULL,
    "wordCount" INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS "learning_skills" (
    "id" TEXT PRIMARY KEY,
    "title" TEXT NOT NULL,
    "language" TEXT NOT NULL
);
"#;

/// Splits a script on `;` outside of quoted text.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    for ch in sql.chars() {
        match ch {
            '\'' if !in_double_quote => in_single_quote = !in_single_quote,
            '"' if !in_single_quote => in_double_quote = !in_double_quote,
            ';' if !in_single_quote && !in_double_quote => {
                push_statement(&mut statements, &current);
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    push_statement(&mut statements, &current);

    statements
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let sql = raw
        .lines()
        .filter(|line| !line.trim().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed = sql.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}
