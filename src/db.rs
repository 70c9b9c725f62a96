use log::info;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    team_name TEXT NOT NULL UNIQUE,
    product_owner_user_id INTEGER NULL REFERENCES users(user_id),
    project_manager_user_id INTEGER NULL REFERENCES users(user_id)
);

CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    profile_picture_url TEXT NOT NULL DEFAULT 'user.jpg',
    role TEXT NOT NULL DEFAULT 'SupportStaff',
    team_id INTEGER NULL REFERENCES teams(id),
    force_password_change BOOLEAN NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NULL,
    start_date TIMESTAMP NULL,
    end_date TIMESTAMP NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NULL,
    status TEXT NOT NULL,
    priority TEXT NOT NULL,
    tags TEXT NULL,
    start_date TIMESTAMP NULL,
    due_date TIMESTAMP NULL,
    points INTEGER NULL,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    author_user_id INTEGER NOT NULL REFERENCES users(user_id),
    assigned_user_id INTEGER NOT NULL REFERENCES users(user_id)
);

CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL,
    task_id INTEGER NOT NULL REFERENCES tasks(id),
    user_id INTEGER NOT NULL REFERENCES users(user_id),
    created_at TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS attachments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_url TEXT NOT NULL,
    file_name TEXT NULL,
    task_id INTEGER NOT NULL REFERENCES tasks(id),
    uploaded_by_id INTEGER NOT NULL REFERENCES users(user_id)
);
"#;

/// Creates the database file if needed and returns a pool shared for the
/// lifetime of the process. Ids come from AUTOINCREMENT columns, so no
/// handler ever has to compute the next key itself.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url).await?;
    }

    let pool = SqlitePool::connect(database_url).await?;
    apply_schema(&pool).await?;
    info!("Database schema is ready");

    Ok(pool)
}

pub async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA.split(';') {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement).execute(pool).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    use sqlx::sqlite::SqlitePoolOptions;

    // A single connection keeps the in-memory database alive and shared.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    apply_schema(&pool).await.unwrap();
    pool
}
