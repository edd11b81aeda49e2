use super::dto::{CreateWorkoutRequest, EntryRequest, UpdateWorkoutRequest};
use super::repo_types::{EntryDraft, WorkoutDraft};
use crate::error::ApiError;

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_ENTRIES: usize = 100;

fn validate_header(
    title: &str,
    duration_minutes: i32,
    calories_burned: Option<i32>,
) -> Result<(), ApiError> {
    if title.is_empty() {
        return Err(ApiError::validation("title is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::validation(format!(
            "title cannot be greater than {MAX_TITLE_LEN} characters"
        )));
    }
    if duration_minutes <= 0 {
        return Err(ApiError::validation("duration_minutes must be greater than 0"));
    }
    if calories_burned.is_some_and(|c| c < 0) {
        return Err(ApiError::validation("calories_burned cannot be negative"));
    }
    Ok(())
}

fn entry_draft(position: usize, entry: EntryRequest) -> Result<EntryDraft, ApiError> {
    let name = entry.exercise_name.trim();
    if name.is_empty() {
        return Err(ApiError::validation(format!(
            "entries[{position}]: exercise_name is required"
        )));
    }
    if entry.sets <= 0 {
        return Err(ApiError::validation(format!(
            "entries[{position}]: sets must be greater than 0"
        )));
    }
    match (entry.reps, entry.duration_seconds) {
        (Some(_), Some(_)) | (None, None) => {
            return Err(ApiError::validation(format!(
                "entries[{position}]: exactly one of reps or duration_seconds is required"
            )));
        }
        (Some(r), None) if r <= 0 => {
            return Err(ApiError::validation(format!(
                "entries[{position}]: reps must be greater than 0"
            )));
        }
        (None, Some(d)) if d <= 0 => {
            return Err(ApiError::validation(format!(
                "entries[{position}]: duration_seconds must be greater than 0"
            )));
        }
        _ => {}
    }
    if entry.weight.is_some_and(|w| !w.is_finite() || w < 0.0) {
        return Err(ApiError::validation(format!(
            "entries[{position}]: weight cannot be negative"
        )));
    }

    let notes = entry
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    Ok(EntryDraft {
        exercise_name: name.to_string(),
        sets: entry.sets,
        reps: entry.reps,
        duration_seconds: entry.duration_seconds,
        weight: entry.weight,
        notes,
    })
}

fn entry_drafts(entries: Vec<EntryRequest>) -> Result<Vec<EntryDraft>, ApiError> {
    if entries.len() > MAX_ENTRIES {
        return Err(ApiError::validation(format!(
            "a workout cannot have more than {MAX_ENTRIES} entries"
        )));
    }
    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| entry_draft(i, e))
        .collect()
}

/// Trims and checks a create body, producing the draft to persist.
pub fn draft_from_create(req: CreateWorkoutRequest) -> Result<WorkoutDraft, ApiError> {
    let title = req.title.trim().to_string();
    validate_header(&title, req.duration_minutes, req.calories_burned)?;
    Ok(WorkoutDraft {
        title,
        description: req.description.trim().to_string(),
        duration_minutes: req.duration_minutes,
        calories_burned: req.calories_burned,
        entries: entry_drafts(req.entries)?,
    })
}

/// Overlays an update body on the stored state and checks the result.
pub fn merge_update(
    current: WorkoutDraft,
    req: UpdateWorkoutRequest,
) -> Result<WorkoutDraft, ApiError> {
    let title = req
        .title
        .map(|t| t.trim().to_string())
        .unwrap_or(current.title);
    let duration_minutes = req.duration_minutes.unwrap_or(current.duration_minutes);
    // null and absent both keep the stored value; calories cannot be cleared
    let calories_burned = req.calories_burned.or(current.calories_burned);
    validate_header(&title, duration_minutes, calories_burned)?;

    let entries = match req.entries {
        Some(entries) => entry_drafts(entries)?,
        None => current.entries,
    };
    Ok(WorkoutDraft {
        title,
        description: req
            .description
            .map(|d| d.trim().to_string())
            .unwrap_or(current.description),
        duration_minutes,
        calories_burned,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reps_entry(name: &str) -> EntryRequest {
        EntryRequest {
            exercise_name: name.into(),
            sets: 3,
            reps: Some(10),
            ..Default::default()
        }
    }

    fn create_req() -> CreateWorkoutRequest {
        CreateWorkoutRequest {
            title: "  Push day ".into(),
            description: "chest".into(),
            duration_minutes: 45,
            calories_burned: Some(300),
            entries: vec![reps_entry("bench"), reps_entry("dips")],
        }
    }

    fn message(err: ApiError) -> String {
        match err {
            ApiError::Validation(m) => m,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn create_trims_and_keeps_entry_order() {
        let draft = draft_from_create(create_req()).unwrap();
        assert_eq!(draft.title, "Push day");
        let names: Vec<_> = draft.entries.iter().map(|e| e.exercise_name.as_str()).collect();
        assert_eq!(names, ["bench", "dips"]);
    }

    #[test]
    fn create_rejects_bad_header() {
        let mut req = create_req();
        req.title = "   ".into();
        assert_eq!(message(draft_from_create(req).unwrap_err()), "title is required");

        let mut req = create_req();
        req.duration_minutes = 0;
        assert!(draft_from_create(req).is_err());

        let mut req = create_req();
        req.calories_burned = Some(-1);
        assert!(draft_from_create(req).is_err());
    }

    #[test]
    fn entry_needs_exactly_one_of_reps_or_duration() {
        let mut req = create_req();
        req.entries[1].duration_seconds = Some(30);
        assert_eq!(
            message(draft_from_create(req).unwrap_err()),
            "entries[1]: exactly one of reps or duration_seconds is required"
        );

        let mut req = create_req();
        req.entries[0].reps = None;
        assert!(draft_from_create(req).is_err());

        let mut req = create_req();
        req.entries[0].reps = None;
        req.entries[0].duration_seconds = Some(60);
        assert!(draft_from_create(req).is_ok());
    }

    #[test]
    fn entry_rejects_bad_sets_and_weight() {
        let mut req = create_req();
        req.entries[0].sets = 0;
        assert!(draft_from_create(req).is_err());

        let mut req = create_req();
        req.entries[0].weight = Some(-2.5);
        assert!(draft_from_create(req).is_err());

        let mut req = create_req();
        req.entries[0].weight = Some(f64::NAN);
        assert!(draft_from_create(req).is_err());
    }

    #[test]
    fn too_many_entries_is_rejected() {
        let mut req = create_req();
        req.entries = (0..=MAX_ENTRIES).map(|i| reps_entry(&format!("e{i}"))).collect();
        assert!(draft_from_create(req).is_err());
    }

    #[test]
    fn merge_keeps_absent_fields() {
        let current = draft_from_create(create_req()).unwrap();
        let merged = merge_update(
            current.clone(),
            UpdateWorkoutRequest {
                title: Some("Pull day".into()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(merged.title, "Pull day");
        assert_eq!(merged.duration_minutes, current.duration_minutes);
        assert_eq!(merged.calories_burned, Some(300));
        assert_eq!(merged.description, current.description);
        assert_eq!(merged.entries, current.entries);
    }

    #[test]
    fn merge_replaces_entries_when_given() {
        let current = draft_from_create(create_req()).unwrap();
        let merged = merge_update(
            current,
            UpdateWorkoutRequest {
                entries: Some(vec![reps_entry("row")]),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(merged.entries.len(), 1);
        assert_eq!(merged.entries[0].exercise_name, "row");

        let current = draft_from_create(create_req()).unwrap();
        let cleared = merge_update(
            current,
            UpdateWorkoutRequest {
                entries: Some(vec![]),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(cleared.entries.is_empty());
    }

    #[test]
    fn merge_validates_the_result() {
        let current = draft_from_create(create_req()).unwrap();
        let err = merge_update(
            current,
            UpdateWorkoutRequest {
                duration_minutes: Some(-5),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(message(err), "duration_minutes must be greater than 0");
    }
}
