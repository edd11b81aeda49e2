use serde::{Deserialize, Serialize};

use super::repo_types::Workout;

/// One exercise line in a create or update body. Position in the list is its order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryRequest {
    #[serde(default)]
    pub exercise_name: String,
    #[serde(default)]
    pub sets: i32,
    pub reps: Option<i32>,
    pub duration_seconds: Option<i32>,
    pub weight: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateWorkoutRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration_minutes: i32,
    pub calories_burned: Option<i32>,
    #[serde(default)]
    pub entries: Vec<EntryRequest>,
}

/// Body for `PUT /workouts/:id`. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWorkoutRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub calories_burned: Option<i32>,
    pub entries: Option<Vec<EntryRequest>>,
}

#[derive(Debug, Serialize)]
pub struct WorkoutEnvelope {
    pub workout: Workout,
}
