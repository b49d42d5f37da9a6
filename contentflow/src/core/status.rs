//! Job status, failure kinds and content enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a content job.
///
/// Statuses follow the pipeline order
/// `pending → researching → planning → writing → editing → completed`,
/// with `failed` as the single absorbing failure state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Submitted, no stage has started.
    #[default]
    Pending,
    /// Research stage in progress.
    Researching,
    /// Planning stage in progress.
    Planning,
    /// Writing stage in progress.
    Writing,
    /// Editing stage in progress.
    Editing,
    /// All stages succeeded.
    Completed,
    /// A stage failed or the job was cancelled.
    Failed,
}

impl JobStatus {
    /// All statuses in pipeline order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Researching,
        Self::Planning,
        Self::Writing,
        Self::Editing,
        Self::Completed,
        Self::Failed,
    ];

    /// Returns true for `completed` and `failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true while a stage is running.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            Self::Researching | Self::Planning | Self::Writing | Self::Editing
        )
    }

    /// Position of an in-progress status in the pipeline order.
    fn phase_index(self) -> Option<u8> {
        match self {
            Self::Researching => Some(0),
            Self::Planning => Some(1),
            Self::Writing => Some(2),
            Self::Editing => Some(3),
            _ => None,
        }
    }

    /// Returns true if the state machine allows moving from `self` to `next`.
    ///
    /// In-progress statuses may repeat (several stages can share a phase) or
    /// skip forward, but never move backwards.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match (*self, next) {
            (Self::Completed | Self::Failed, _) => false,
            (_, Self::Failed) => true,
            (Self::Pending, next) => next == Self::Researching,
            (current, Self::Completed) => current.is_in_progress(),
            (current, next) => match (current.phase_index(), next.phase_index()) {
                (Some(from), Some(to)) => to >= from,
                _ => false,
            },
        }
    }

    /// Coarse progress percentage reported to clients.
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Researching => 25,
            Self::Planning => 50,
            Self::Writing => 75,
            Self::Editing => 90,
            Self::Completed | Self::Failed => 100,
        }
    }

    /// Returns the snake_case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Researching => "researching",
            Self::Planning => "planning",
            Self::Writing => "writing",
            Self::Editing => "editing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown job status: {s}"))
    }
}

/// Why a job ended up `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Retryable failure that exhausted its attempts.
    Transient,
    /// Non-retryable failure (invalid input, content policy).
    Permanent,
    /// Every attempt of the final stage timed out.
    Timeout,
    /// User or operator cancellation.
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Kind of content to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Blog post.
    #[default]
    BlogPost,
    /// Long-form article.
    Article,
    /// Social media post.
    SocialMedia,
    /// Email copy.
    Email,
    /// Landing page copy.
    LandingPage,
    /// Product description.
    ProductDescription,
}

impl ContentType {
    /// Returns the snake_case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlogPost => "blog_post",
            Self::Article => "article",
            Self::SocialMedia => "social_media",
            Self::Email => "email",
            Self::LandingPage => "landing_page",
            Self::ProductDescription => "product_description",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blog_post" => Ok(Self::BlogPost),
            "article" => Ok(Self::Article),
            "social_media" | "social" => Ok(Self::SocialMedia),
            "email" => Ok(Self::Email),
            "landing_page" => Ok(Self::LandingPage),
            "product_description" => Ok(Self::ProductDescription),
            other => Err(format!("unknown content type: {other}")),
        }
    }
}

/// Writing tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    /// Professional.
    #[default]
    Professional,
    /// Casual.
    Casual,
    /// Friendly.
    Friendly,
    /// Formal.
    Formal,
    /// Persuasive.
    Persuasive,
    /// Informative.
    Informative,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Professional => write!(f, "professional"),
            Self::Casual => write!(f, "casual"),
            Self::Friendly => write!(f, "friendly"),
            Self::Formal => write!(f, "formal"),
            Self::Persuasive => write!(f, "persuasive"),
            Self::Informative => write!(f, "informative"),
        }
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "professional" => Ok(Self::Professional),
            "casual" => Ok(Self::Casual),
            "friendly" => Ok(Self::Friendly),
            "formal" => Ok(Self::Formal),
            "persuasive" => Ok(Self::Persuasive),
            "informative" => Ok(Self::Informative),
            other => Err(format!("unknown tone: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Writing.is_terminal());
    }

    #[test]
    fn test_pending_only_moves_to_researching_or_failed() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Researching));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Planning));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn test_in_progress_moves_forward_only() {
        assert!(JobStatus::Researching.can_transition_to(JobStatus::Planning));
        assert!(JobStatus::Planning.can_transition_to(JobStatus::Planning));
        assert!(JobStatus::Planning.can_transition_to(JobStatus::Editing));
        assert!(!JobStatus::Writing.can_transition_to(JobStatus::Researching));
        assert!(!JobStatus::Editing.can_transition_to(JobStatus::Pending));
        assert!(JobStatus::Editing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Writing.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn test_terminal_statuses_are_absorbing() {
        for next in JobStatus::ALL {
            assert!(!JobStatus::Completed.can_transition_to(next));
            assert!(!JobStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&JobStatus::Researching).unwrap();
        assert_eq!(json, r#""researching""#);
        assert_eq!("editing".parse::<JobStatus>().unwrap(), JobStatus::Editing);
        assert!("drafting".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_content_type_parse() {
        assert_eq!("blog_post".parse::<ContentType>().unwrap(), ContentType::BlogPost);
        assert_eq!("social".parse::<ContentType>().unwrap(), ContentType::SocialMedia);
        assert_eq!(ContentType::LandingPage.to_string(), "landing_page");
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::Cancelled.to_string(), "cancelled");
        assert_eq!(FailureKind::Timeout.to_string(), "timeout");
    }
}
