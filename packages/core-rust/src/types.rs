use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::geo::Coordinate;

/// Canonical form of a capability tag: trimmed, lower-cased, inner whitespace
/// runs collapsed to a single space.
///
/// `"  Heavy   Lifting "` and `"heavy lifting"` normalize to the same tag.
#[must_use]
pub fn normalize_skill(skill: &str) -> String {
    skill
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lifecycle state of a [`Task`].
///
/// `Pending` is the only non-terminal state. A task leaves it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Failed,
}

impl TaskStatus {
    /// Lower-case wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A worker that can be assigned tasks.
///
/// All fields are validated at construction. Availability is the only state
/// that changes afterwards, and only through [`Worker::claim`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Worker {
    id: String,
    name: String,
    location: Coordinate,
    skills: BTreeSet<String>,
    is_available: bool,
}

impl Worker {
    /// Builds an available worker with a trimmed name and normalized skills.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] for a blank name,
    /// [`ValidationError::EmptySkills`] when no skills are given and
    /// [`ValidationError::BlankSkill`] for the first whitespace-only entry.
    pub fn new<I, S>(
        id: impl Into<String>,
        name: &str,
        location: Coordinate,
        skills: I,
    ) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let mut normalized = BTreeSet::new();
        for (index, skill) in skills.into_iter().enumerate() {
            let skill = normalize_skill(skill.as_ref());
            if skill.is_empty() {
                return Err(ValidationError::BlankSkill { index });
            }
            normalized.insert(skill);
        }
        if normalized.is_empty() {
            return Err(ValidationError::EmptySkills);
        }

        Ok(Self {
            id: id.into(),
            name: name.to_string(),
            location,
            skills: normalized,
            is_available: true,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn location(&self) -> Coordinate {
        self.location
    }

    /// Normalized skill tags in sorted order.
    #[must_use]
    pub fn skills(&self) -> &BTreeSet<String> {
        &self.skills
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.is_available
    }

    /// Checks for an already-normalized skill tag.
    #[must_use]
    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills.contains(skill)
    }

    /// Marks the worker unavailable. Returns `false` if it already was.
    pub fn claim(&mut self) -> bool {
        std::mem::replace(&mut self.is_available, false)
    }
}

/// A unit of work: a location and the capability required to serve it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    id: String,
    location: Coordinate,
    required_skill: String,
    status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    assigned_worker_id: Option<String>,
}

impl Task {
    /// Builds a `Pending` task with a normalized required skill.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::BlankRequiredSkill`] for a whitespace-only skill.
    pub fn new(
        id: impl Into<String>,
        location: Coordinate,
        required_skill: &str,
    ) -> Result<Self, ValidationError> {
        let required_skill = normalize_skill(required_skill);
        if required_skill.is_empty() {
            return Err(ValidationError::BlankRequiredSkill);
        }
        Ok(Self {
            id: id.into(),
            location,
            required_skill,
            status: TaskStatus::Pending,
            assigned_worker_id: None,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn location(&self) -> Coordinate {
        self.location
    }

    #[must_use]
    pub fn required_skill(&self) -> &str {
        &self.required_skill
    }

    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Worker id, present if and only if the task is `Assigned`.
    #[must_use]
    pub fn assigned_worker_id(&self) -> Option<&str> {
        self.assigned_worker_id.as_deref()
    }

    /// Sets the status. The worker reference is kept only for `Assigned`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingAssignee`] when `status` is
    /// `Assigned` but no worker id is given. The task is left unchanged.
    pub fn set_status(
        &mut self,
        status: TaskStatus,
        worker_id: Option<String>,
    ) -> Result<(), ValidationError> {
        match (status, worker_id) {
            (TaskStatus::Assigned, None) => return Err(ValidationError::MissingAssignee),
            (TaskStatus::Assigned, Some(worker_id)) => {
                self.assigned_worker_id = Some(worker_id);
            }
            _ => self.assigned_worker_id = None,
        }
        self.status = status;
        Ok(())
    }

    /// `Pending` -> `Failed`. Terminal tasks are left untouched and `false`
    /// is returned.
    pub fn fail(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Failed;
        self.assigned_worker_id = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn here() -> Coordinate {
        Coordinate::new(60.17, 24.94).unwrap()
    }

    #[test]
    fn normalize_skill_folds_case_and_whitespace() {
        assert_eq!(normalize_skill("  Delivery "), "delivery");
        assert_eq!(normalize_skill("Heavy\t  LIFTING"), "heavy lifting");
        assert_eq!(normalize_skill("   "), "");
    }

    #[test]
    fn worker_normalizes_and_dedups_skills() {
        let worker =
            Worker::new("w-1", "  Alice ", here(), ["Delivery", "delivery ", "Repair"]).unwrap();
        assert_eq!(worker.name(), "Alice");
        assert_eq!(
            worker.skills().iter().cloned().collect::<Vec<_>>(),
            vec!["delivery".to_string(), "repair".to_string()]
        );
        assert!(worker.is_available());
        assert!(worker.has_skill("delivery"));
        assert!(!worker.has_skill("Delivery"));
    }

    #[test]
    fn worker_rejects_empty_name() {
        let err = Worker::new("w-1", "   ", here(), ["delivery"]).unwrap_err();
        assert_eq!(err, ValidationError::EmptyName);
    }

    #[test]
    fn worker_rejects_empty_skill_set() {
        let err = Worker::new("w-1", "Bob", here(), Vec::<String>::new()).unwrap_err();
        assert_eq!(err, ValidationError::EmptySkills);
    }

    #[test]
    fn worker_rejects_blank_skill_with_index() {
        let err = Worker::new("w-1", "Bob", here(), ["delivery", " \t"]).unwrap_err();
        assert_eq!(err, ValidationError::BlankSkill { index: 1 });
    }

    #[test]
    fn claim_flips_availability_once() {
        let mut worker = Worker::new("w-1", "Bob", here(), ["delivery"]).unwrap();
        assert!(worker.claim());
        assert!(!worker.is_available());
        assert!(!worker.claim());
    }

    #[test]
    fn worker_serializes_wire_shape() {
        let worker = Worker::new("w-1", "Bob", here(), ["Repair", "delivery"]).unwrap();
        let json = serde_json::to_value(&worker).unwrap();
        assert_eq!(json["id"], "w-1");
        assert_eq!(json["skills"], serde_json::json!(["delivery", "repair"]));
        assert_eq!(json["is_available"], true);
        assert_eq!(json["location"]["lat"], 60.17);
    }

    #[test]
    fn task_starts_pending_with_normalized_skill() {
        let task = Task::new("t-1", here(), " DELIVERY ").unwrap();
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.required_skill(), "delivery");
        assert!(task.assigned_worker_id().is_none());
    }

    #[test]
    fn task_rejects_blank_skill() {
        assert_eq!(
            Task::new("t-1", here(), "  ").unwrap_err(),
            ValidationError::BlankRequiredSkill
        );
    }

    #[test]
    fn set_status_keeps_assignee_only_when_assigned() {
        let mut task = Task::new("t-1", here(), "delivery").unwrap();

        task.set_status(TaskStatus::Assigned, Some("w-1".into())).unwrap();
        assert_eq!(task.assigned_worker_id(), Some("w-1"));

        task.set_status(TaskStatus::Failed, Some("w-1".into())).unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert!(task.assigned_worker_id().is_none());
    }

    #[test]
    fn set_status_assigned_requires_worker() {
        let mut task = Task::new("t-1", here(), "delivery").unwrap();
        assert_eq!(
            task.set_status(TaskStatus::Assigned, None),
            Err(ValidationError::MissingAssignee)
        );
        assert_eq!(task.status(), TaskStatus::Pending);
    }

    #[test]
    fn fail_only_from_pending() {
        let mut task = Task::new("t-1", here(), "delivery").unwrap();
        assert!(task.fail());
        assert_eq!(task.status(), TaskStatus::Failed);
        assert!(!task.fail());

        let mut assigned = Task::new("t-2", here(), "delivery").unwrap();
        assigned.set_status(TaskStatus::Assigned, Some("w-1".into())).unwrap();
        assert!(!assigned.fail());
        assert_eq!(assigned.status(), TaskStatus::Assigned);
    }

    #[test]
    fn task_serialization_omits_missing_assignee() {
        let task = Task::new("t-1", here(), "delivery").unwrap();
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("assigned_worker_id").is_none());
    }
}
