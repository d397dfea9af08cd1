use serde::{Deserialize, Serialize};

use crate::models::comment::Comment;

#[derive(Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

#[derive(Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub edited: bool,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        CommentView {
            edited: comment.edited(),
            comment,
        }
    }
}

#[derive(Serialize)]
pub struct CommentResponse {
    pub success: bool,
    pub comment: CommentView,
}

#[derive(Serialize)]
pub struct CommentListResponse {
    pub success: bool,
    pub comments: Vec<CommentView>,
}
