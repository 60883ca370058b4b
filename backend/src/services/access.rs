use std::collections::HashSet;

use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::orders;
use crate::error::AppError;
use crate::models::{Course, Topic};
use crate::services::subscription::{self, SubscriptionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    /// Paid subscription covers every course.
    Subscribed,
    /// Course bought on its own.
    Purchased,
    /// Free course opened by the signup trial.
    Trial,
    Locked,
}

impl AccessStatus {
    pub fn is_open(self) -> bool {
        self != AccessStatus::Locked
    }
}

pub fn course_access(course: &Course, status: &SubscriptionStatus, purchased: bool) -> AccessStatus {
    if status.has_paid_access() {
        AccessStatus::Subscribed
    } else if purchased {
        AccessStatus::Purchased
    } else if course.is_free && status.is_trial_active {
        AccessStatus::Trial
    } else {
        AccessStatus::Locked
    }
}

/// Free topics are previews and stay open even inside a locked course.
pub fn topic_accessible(course_access: AccessStatus, topic: &Topic) -> bool {
    course_access.is_open() || topic.is_free
}

/// Everything needed to answer access questions for one student.
#[derive(Debug, Clone)]
pub struct StudentAccess {
    pub status: SubscriptionStatus,
    purchased: HashSet<String>,
}

impl StudentAccess {
    pub async fn load(db: &SqlitePool, user_id: &str) -> Result<Self, AppError> {
        let status = subscription::resolve(db, user_id).await?;
        let purchased = orders::purchased_course_ids(db, user_id)
            .await?
            .into_iter()
            .collect();

        Ok(Self { status, purchased })
    }

    pub fn new(status: SubscriptionStatus, purchased: impl IntoIterator<Item = String>) -> Self {
        Self {
            status,
            purchased: purchased.into_iter().collect(),
        }
    }

    pub fn course(&self, course: &Course) -> AccessStatus {
        course_access(course, &self.status, self.purchased.contains(&course.id))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseWithAccess {
    #[serde(flatten)]
    pub course: Course,
    pub access: AccessStatus,
}

/// Topic as shown to clients; `video_url` only when the topic is playable.
#[derive(Debug, Clone, Serialize)]
pub struct TopicView {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: i64,
    pub sequence_order: i64,
    pub is_free: bool,
    pub locked: bool,
    pub video_url: Option<String>,
    pub stream_url: Option<String>,
}

impl TopicView {
    pub fn new(topic: Topic, accessible: bool) -> Self {
        let stream_url = accessible.then(|| format!("/api/v1/topics/{}/stream", topic.id));
        Self {
            video_url: accessible.then_some(topic.video_url),
            stream_url,
            id: topic.id,
            course_id: topic.course_id,
            title: topic.title,
            description: topic.description,
            thumbnail_url: topic.thumbnail_url,
            duration_seconds: topic.duration_seconds,
            sequence_order: topic.sequence_order,
            is_free: topic.is_free,
            locked: !accessible,
        }
    }

    /// Anonymous listing: nothing is playable, free topics are flagged open.
    pub fn public(topic: Topic) -> Self {
        let locked = !topic.is_free;
        let mut view = Self::new(topic, false);
        view.locked = locked;
        view
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseContent {
    pub course: CourseWithAccess,
    pub topics: Vec<TopicView>,
}

pub fn course_content(access: &StudentAccess, course: Course, topics: Vec<Topic>) -> CourseContent {
    let level = access.course(&course);
    let topics = topics
        .into_iter()
        .map(|t| {
            let open = topic_accessible(level, &t);
            TopicView::new(t, open)
        })
        .collect();

    CourseContent {
        course: CourseWithAccess {
            course,
            access: level,
        },
        topics,
    }
}
