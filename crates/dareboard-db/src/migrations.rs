use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE profiles (
                id                  TEXT PRIMARY KEY,
                name                TEXT NOT NULL,
                profile_image       TEXT,
                avatar_color        TEXT,
                daily_streak        INTEGER NOT NULL DEFAULT 0,
                last_completion_at  INTEGER,
                created_at          INTEGER NOT NULL
            );

            CREATE TABLE tasks (
                id          TEXT PRIMARY KEY,
                creator_id  TEXT REFERENCES profiles(id),
                title       TEXT NOT NULL,
                description TEXT NOT NULL,
                image_url   TEXT,
                created_at  INTEGER NOT NULL
            );

            CREATE TABLE executions (
                id           TEXT PRIMARY KEY,
                task_id      TEXT NOT NULL REFERENCES tasks(id),
                user_id      TEXT NOT NULL REFERENCES profiles(id),
                executed_at  INTEGER NOT NULL,
                completed    INTEGER NOT NULL DEFAULT 0,
                completed_at INTEGER
            );

            CREATE INDEX idx_executions_task_user
                ON executions(task_id, user_id);

            -- Directed edges; a friendship is two accepted rows.
            CREATE TABLE relationships (
                id          TEXT PRIMARY KEY,
                from_user   TEXT NOT NULL REFERENCES profiles(id),
                to_user     TEXT NOT NULL REFERENCES profiles(id),
                status      TEXT NOT NULL CHECK (status IN ('pending', 'accepted')),
                created_at  INTEGER NOT NULL,
                accepted_at INTEGER,
                CHECK (from_user <> to_user),
                UNIQUE (from_user, to_user)
            );

            CREATE INDEX idx_relationships_to
                ON relationships(to_user);

            CREATE TABLE challenge_invites (
                id           TEXT PRIMARY KEY,
                from_user    TEXT NOT NULL REFERENCES profiles(id),
                to_user      TEXT NOT NULL REFERENCES profiles(id),
                task_id      TEXT NOT NULL REFERENCES tasks(id),
                execution_id TEXT UNIQUE REFERENCES executions(id),
                message      TEXT CHECK (message IS NULL OR length(message) <= 200),
                status       TEXT NOT NULL
                    CHECK (status IN ('pending', 'accepted', 'declined', 'completed')),
                created_at   INTEGER NOT NULL,
                responded_at INTEGER,
                completed_at INTEGER,
                CHECK (from_user <> to_user)
            );

            -- At most one pending invite per (challenger, friend, task).
            CREATE UNIQUE INDEX idx_challenge_invites_pending
                ON challenge_invites(from_user, to_user, task_id)
                WHERE status = 'pending';

            CREATE INDEX idx_challenge_invites_to
                ON challenge_invites(to_user, status);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
