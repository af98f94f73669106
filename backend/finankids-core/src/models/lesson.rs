use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::activity::Activity;

/// Lesson document from the `lessons` collection.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Lesson {
    #[serde(rename = "_id")]
    pub id: String,

    #[validate(length(
        min = 1,
        max = 120,
        message = "Title must be between 1 and 120 characters"
    ))]
    pub title: String,

    /// Category slug, e.g. `saving`; drives the category achievements
    #[validate(length(min = 1, max = 40, message = "Category must not be empty"))]
    pub category: String,

    pub base_exp: u32,
    pub base_money: u32,

    #[validate(
        length(min = 1, message = "Lesson must contain at least one activity"),
        custom(function = "validate_activities")
    )]
    pub activities: Vec<Activity>,
}

fn validate_activities(activities: &[Activity]) -> Result<(), ValidationError> {
    for (index, activity) in activities.iter().enumerate() {
        activity.check().map_err(|mut err| {
            err.add_param("index".into(), &index);
            err
        })?;
    }
    Ok(())
}
