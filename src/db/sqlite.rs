use std::sync::{Mutex, MutexGuard};

use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::core::{DataSphereError, Result};
use crate::db::store::{
    EducationRecord, ExperienceRecord, NewEducation, NewExperience, NewUser, ProgressRecord,
    UserProfile, UserRecord, UserStore, UserUpdate,
};
use crate::utils::avatar_url;

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS Users (
    user_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    password_salt TEXT NOT NULL,
    school        TEXT,
    age           INTEGER,
    source        TEXT,
    city          TEXT,
    avatar        TEXT,
    headline      TEXT,
    bio           TEXT,
    created_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS User_Experience (
    experience_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       INTEGER NOT NULL REFERENCES Users(user_id) ON DELETE CASCADE,
    role          TEXT NOT NULL,
    company       TEXT,
    year          TEXT,
    description   TEXT,
    created_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS User_Education (
    education_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      INTEGER NOT NULL REFERENCES Users(user_id) ON DELETE CASCADE,
    school       TEXT NOT NULL,
    degree       TEXT,
    year         TEXT,
    created_at   TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS User_Progress (
    user_id      INTEGER NOT NULL REFERENCES Users(user_id) ON DELETE CASCADE,
    lesson_id    TEXT NOT NULL,
    completed    INTEGER NOT NULL,
    completed_at TEXT,
    UNIQUE (user_id, lesson_id)
);
";

const USER_COLUMNS: &str =
    "user_id, name, email, school, city, age, source, avatar, headline, bio, created_at";

/// SQLite implementation of [`UserStore`]
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`; `:memory:` gives a throwaway store
    pub fn open(path: &str) -> Result<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.execute_batch(SCHEMA)?;
        info!("User store ready at {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DataSphereError::DatabaseError("connection lock poisoned".to_string()))
    }
}

fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        school: row.get("school")?,
        city: row.get("city")?,
        age: row.get("age")?,
        source: row.get("source")?,
        avatar: row.get("avatar")?,
        headline: row.get("headline")?,
        bio: row.get("bio")?,
        created_at: row.get("created_at")?,
    })
}

fn experience_from_row(row: &Row<'_>) -> rusqlite::Result<ExperienceRecord> {
    Ok(ExperienceRecord {
        experience_id: row.get("experience_id")?,
        user_id: row.get("user_id")?,
        role: row.get("role")?,
        company: row.get("company")?,
        year: row.get("year")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
    })
}

fn education_from_row(row: &Row<'_>) -> rusqlite::Result<EducationRecord> {
    Ok(EducationRecord {
        education_id: row.get("education_id")?,
        user_id: row.get("user_id")?,
        school: row.get("school")?,
        degree: row.get("degree")?,
        year: row.get("year")?,
        created_at: row.get("created_at")?,
    })
}

impl UserStore for SqliteStore {
    fn signup(&self, user: &NewUser) -> Result<UserRecord> {
        let conn = self.conn()?;
        let salt = Uuid::new_v4().simple().to_string();
        let hash = password_digest(&salt, &user.password);
        let avatar = avatar_url(&user.name);

        let sql = format!(
            "INSERT INTO Users (name, email, password_hash, password_salt, school, age, source, city, avatar)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             RETURNING {}",
            USER_COLUMNS
        );
        let record = conn.query_row(
            &sql,
            params![
                user.name,
                user.email,
                hash,
                salt,
                user.school,
                user.age,
                user.source,
                user.city,
                avatar
            ],
            user_from_row,
        )?;

        debug!("Created user {} ({})", record.user_id, record.email);
        Ok(record)
    }

    fn login(&self, email: &str, password: &str) -> Result<Option<UserProfile>> {
        let conn = self.conn()?;

        let sql = format!(
            "SELECT {}, password_hash, password_salt FROM Users WHERE email = ?1",
            USER_COLUMNS
        );
        let found = conn
            .query_row(&sql, params![email], |row| {
                let user = user_from_row(row)?;
                let hash: String = row.get("password_hash")?;
                let salt: String = row.get("password_salt")?;
                Ok((user, hash, salt))
            })
            .optional()?;

        let user = match found {
            Some((user, hash, salt)) if password_digest(&salt, password) == hash => user,
            _ => return Ok(None),
        };

        let mut stmt = conn.prepare(
            "SELECT * FROM User_Experience WHERE user_id = ?1 ORDER BY created_at DESC, experience_id DESC",
        )?;
        let experience = stmt
            .query_map(params![user.user_id], experience_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT * FROM User_Education WHERE user_id = ?1 ORDER BY created_at DESC, education_id DESC",
        )?;
        let education = stmt
            .query_map(params![user.user_id], education_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(UserProfile {
            user,
            experience,
            education,
        }))
    }

    fn update_user(&self, update: &UserUpdate) -> Result<Option<UserRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "UPDATE Users
             SET name = COALESCE(?2, name),
                 headline = COALESCE(?3, headline),
                 city = COALESCE(?4, city),
                 bio = COALESCE(?5, bio),
                 updated_at = CURRENT_TIMESTAMP
             WHERE user_id = ?1
             RETURNING {}",
            USER_COLUMNS
        );
        let record = conn
            .query_row(
                &sql,
                params![update.user_id, update.name, update.headline, update.city, update.bio],
                user_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn save_progress(&self, user_id: i64, lesson_id: &str, completed: bool) -> Result<ProgressRecord> {
        let conn = self.conn()?;
        let record = conn.query_row(
            "INSERT INTO User_Progress (user_id, lesson_id, completed, completed_at)
             VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
             ON CONFLICT (user_id, lesson_id)
             DO UPDATE SET completed = excluded.completed, completed_at = CURRENT_TIMESTAMP
             RETURNING user_id, lesson_id, completed, completed_at",
            params![user_id, lesson_id, completed],
            |row| {
                Ok(ProgressRecord {
                    user_id: row.get(0)?,
                    lesson_id: row.get(1)?,
                    completed: row.get(2)?,
                    completed_at: row.get(3)?,
                })
            },
        )?;
        Ok(record)
    }

    fn get_progress(&self, user_id: i64) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT lesson_id FROM User_Progress
             WHERE user_id = ?1 AND completed = 1
             ORDER BY completed_at, lesson_id",
        )?;
        let lessons = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(lessons)
    }

    fn add_experience(&self, experience: &NewExperience) -> Result<ExperienceRecord> {
        let conn = self.conn()?;
        let record = conn.query_row(
            "INSERT INTO User_Experience (user_id, role, company, year, description)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING *",
            params![
                experience.user_id,
                experience.role,
                experience.company,
                experience.year,
                experience.description
            ],
            experience_from_row,
        )?;
        Ok(record)
    }

    fn delete_experience(&self, experience_id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM User_Experience WHERE experience_id = ?1",
            params![experience_id],
        )?;
        Ok(())
    }

    fn add_education(&self, education: &NewEducation) -> Result<EducationRecord> {
        let conn = self.conn()?;
        let record = conn.query_row(
            "INSERT INTO User_Education (user_id, school, degree, year)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING *",
            params![education.user_id, education.school, education.degree, education.year],
            education_from_row,
        )?;
        Ok(record)
    }

    fn delete_education(&self, education_id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM User_Education WHERE education_id = ?1",
            params![education_id],
        )?;
        Ok(())
    }
}
