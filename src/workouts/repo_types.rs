use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// Header row of the `workouts` table.
#[derive(Debug, Clone, FromRow)]
pub struct WorkoutRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub calories_burned: Option<i32>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl WorkoutRow {
    pub fn with_entries(self, entries: Vec<WorkoutEntry>) -> Workout {
        Workout {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            duration_minutes: self.duration_minutes,
            calories_burned: self.calories_burned,
            entries,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WorkoutEntry {
    pub id: i64,
    pub exercise_name: String,
    pub sets: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reps: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub order_index: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The workout aggregate: header plus entries in `order_index` order.
#[derive(Debug, Clone, Serialize)]
pub struct Workout {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories_burned: Option<i32>,
    pub entries: Vec<WorkoutEntry>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Entry contents as submitted; ids, timestamps and `order_index` come from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub exercise_name: String,
    pub sets: i32,
    pub reps: Option<i32>,
    pub duration_seconds: Option<i32>,
    pub weight: Option<f64>,
    pub notes: Option<String>,
}

impl From<WorkoutEntry> for EntryDraft {
    fn from(e: WorkoutEntry) -> Self {
        Self {
            exercise_name: e.exercise_name,
            sets: e.sets,
            reps: e.reps,
            duration_seconds: e.duration_seconds,
            weight: e.weight,
            notes: e.notes,
        }
    }
}

/// Full desired state of a workout for create and full-replace update.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutDraft {
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub calories_burned: Option<i32>,
    pub entries: Vec<EntryDraft>,
}

impl From<Workout> for WorkoutDraft {
    fn from(w: Workout) -> Self {
        Self {
            title: w.title,
            description: w.description,
            duration_minutes: w.duration_minutes,
            calories_burned: w.calories_burned,
            entries: w.entries.into_iter().map(EntryDraft::from).collect(),
        }
    }
}
