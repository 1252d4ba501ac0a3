//! Doubt submission: persist the student's question and hand back the
//! canned acknowledgement. Real answer generation happens elsewhere; this
//! module only records the question and stubs the reply.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::identity::{IdentityProvider, Profile, Row, User};

pub const DOUBTS_TABLE: &str = "doubt_questions";

const PLACEHOLDER_ANSWER: &str = "Processing your question...";

#[derive(Debug, Clone, Default)]
pub struct DoubtSubmission {
    pub text: String,
    pub image_url: Option<String>,
    pub anonymous: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubtReply {
    pub text: String,
    pub references: Vec<Reference>,
}

fn canned_reply(question: &str) -> DoubtReply {
    let topic: String = question.chars().take(50).collect();
    DoubtReply {
        text: format!(
            "Great question! This appears to be about {}... Our AI system is analyzing \
             this and will provide detailed explanations, key points, and relevant \
             resources soon.",
            topic
        ),
        references: vec![
            Reference { title: "Khan Academy".into(), url: "#".into() },
            Reference { title: "Related Videos".into(), url: "#".into() },
        ],
    }
}

/// Record a question in `doubt_questions` and return the stubbed reply.
/// The subject column carries the student's class, which is how teachers
/// find doubts to review.
pub async fn submit_doubt(
    provider: &dyn IdentityProvider,
    user: &User,
    profile: Option<&Profile>,
    submission: DoubtSubmission,
) -> AppResult<DoubtReply> {
    if submission.text.trim().is_empty() && submission.image_url.is_none() {
        return Err(AppError::user("empty_question", "type a question or attach an image"));
    }
    let mut row = Row::new();
    row.insert("student_id".into(), Value::from(user.id.clone()));
    row.insert("question_text".into(), Value::from(submission.text.clone()));
    row.insert(
        "question_image_url".into(),
        submission.image_url.clone().map(Value::from).unwrap_or(Value::Null),
    );
    row.insert(
        "subject".into(),
        profile
            .and_then(|p| p.class.clone())
            .map(Value::from)
            .unwrap_or(Value::Null),
    );
    row.insert("is_anonymous".into(), Value::from(submission.anonymous));
    row.insert("ai_answer".into(), Value::from(PLACEHOLDER_ANSWER));
    provider
        .insert(DOUBTS_TABLE, vec![row])
        .await
        .map_err(|e| AppError::internal("doubt_insert_failed", e.to_string()))?;
    Ok(canned_reply(&submission.text))
}
