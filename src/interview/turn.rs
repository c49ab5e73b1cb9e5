use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    Question,
    Answer,
}

/// One entry of the interview transcript; immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub kind: TurnKind,
    pub text: String,
    /// 1-based position in the conversation
    pub ordinal: u32,
}

impl Turn {
    pub fn question(text: impl Into<String>, ordinal: u32) -> Self {
        Self {
            kind: TurnKind::Question,
            text: text.into(),
            ordinal,
        }
    }

    pub fn answer(text: impl Into<String>, ordinal: u32) -> Self {
        Self {
            kind: TurnKind::Answer,
            text: text.into(),
            ordinal,
        }
    }

    pub fn is_question(&self) -> bool {
        self.kind == TurnKind::Question
    }
}
