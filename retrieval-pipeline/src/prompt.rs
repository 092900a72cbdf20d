use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Sent as the system message with every generation request.
pub const SYSTEM_INSTRUCTION: &str = "You are a course-aligned Professor/TA. Answer using the provided CONTEXT.
If information is not in the context, say you don't have it and suggest where to look.
Always include a short Sources section with [n] markers that map to provided context items.
Prefer the course's conventions and notation if present.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AssistanceLevel {
    /// Patient, high-depth explanations
    Novice,
    /// Concise answers aimed at revision (default)
    #[value(name = "exam_prep")]
    ExamPrep,
    /// Technical answers for confident students
    Advanced,
}

impl Default for AssistanceLevel {
    fn default() -> Self {
        Self::ExamPrep
    }
}

impl std::str::FromStr for AssistanceLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "novice" => Ok(Self::Novice),
            "exam_prep" => Ok(Self::ExamPrep),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!("unknown assistance level '{other}'")),
        }
    }
}

impl fmt::Display for AssistanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AssistanceLevel::Novice => "novice",
            AssistanceLevel::ExamPrep => "exam_prep",
            AssistanceLevel::Advanced => "advanced",
        };
        f.write_str(label)
    }
}

/// Retrieval depth and sampling settings attached to an assistance level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelProfile {
    pub k: usize,
    pub temperature: f32,
    pub depth: &'static str,
    pub tone: &'static str,
}

impl AssistanceLevel {
    /// Parses a caller-supplied level, falling back to the default for anything unknown.
    pub fn resolve(raw: Option<&str>) -> Self {
        match raw.map(str::parse::<Self>) {
            Some(Ok(level)) => level,
            Some(Err(err)) => {
                debug!(error = %err, "Falling back to default assistance level");
                Self::default()
            }
            None => Self::default(),
        }
    }

    pub const fn profile(self) -> LevelProfile {
        match self {
            Self::Novice => LevelProfile {
                k: 12,
                temperature: 0.7,
                depth: "high",
                tone: "friendly",
            },
            Self::ExamPrep => LevelProfile {
                k: 10,
                temperature: 0.5,
                depth: "medium",
                tone: "concise",
            },
            Self::Advanced => LevelProfile {
                k: 6,
                temperature: 0.3,
                depth: "high",
                tone: "technical",
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    /// Step-by-step worked explanation (default)
    Worked,
    /// Leading questions before the explanation
    Socratic,
    /// Method and final answer only
    Exam,
}

impl Default for InteractionMode {
    fn default() -> Self {
        Self::Worked
    }
}

impl std::str::FromStr for InteractionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "worked" => Ok(Self::Worked),
            "socratic" => Ok(Self::Socratic),
            "exam" => Ok(Self::Exam),
            other => Err(format!("unknown interaction mode '{other}'")),
        }
    }
}

impl fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InteractionMode::Worked => "worked",
            InteractionMode::Socratic => "socratic",
            InteractionMode::Exam => "exam",
        };
        f.write_str(label)
    }
}

impl InteractionMode {
    pub fn resolve(raw: Option<&str>) -> Self {
        match raw.map(str::parse::<Self>) {
            Some(Ok(mode)) => mode,
            Some(Err(err)) => {
                debug!(error = %err, "Falling back to default interaction mode");
                Self::default()
            }
            None => Self::default(),
        }
    }

    pub const fn style(self) -> &'static str {
        match self {
            Self::Worked => "Provide a clear, step-by-step worked explanation with formulas.",
            Self::Socratic => {
                "Use a brief, guided style: ask 1-3 leading questions, then give the explanation."
            }
            Self::Exam => "Be concise; show method and final answer. Emphasize common pitfalls.",
        }
    }
}

/// Assembles the user prompt sent alongside [`SYSTEM_INSTRUCTION`].
pub fn build_prompt(
    question: &str,
    level: AssistanceLevel,
    mode: InteractionMode,
    context: &str,
) -> String {
    let profile = level.profile();
    format!(
        "User level: {level}. Mode: {mode}. Depth: {depth}. Tone: {tone}.
{style}

Write your answer in Markdown with this structure:
- Start with **TL;DR**: exactly 1–2 sentences.
- Then the explanation.
- Put **[n]** inline right after each sentence or equation that uses a source.
- End with a **Sources** section listing the [n] you used.

QUESTION:
{question}

CONTEXT (cite with [n]):
{context}

INSTRUCTIONS:
- Use the CONTEXT heavily; if missing, say so.
- Keep notation consistent with the course materials.
- Show key steps (not every algebra line).
- If an image is relevant, refer to it as [n] and summarize its caption.",
        depth = profile.depth,
        tone = profile.tone,
        style = mode.style(),
        question = question.trim(),
    )
}
