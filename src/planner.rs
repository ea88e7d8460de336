//! Question planner.
//!
//! Decides which question, if any, the next digest should ask. The plan is
//! a static table: core attributes first, in order, then secondary topics.
//! Selection is a pure lookup over the profile; recording a question as
//! asked is left to the caller once the question has actually gone out.

use crate::profile::{CoreKey, Profile};

pub const LOCATION_PROMPTS: &[&str] = &[
    "I'd love to know what city/area you live in! It would help me share more relevant updates and chat about local happenings.",
    "I'm always curious about different places - where are you writing from?",
    "I'd love to add some local context to our chats. Which city/area do you call home?",
    "Speaking of places, I'd love to know where you're based! What city/area are you in?",
    "I bet there are interesting things happening in your area! Where are you located?",
];

/// Asked once every location variant is used up. Allowed to repeat.
pub const LOCATION_FALLBACK: &str = "I notice I still don't know where you're based - I'd love to make our conversations more locally relevant. What city/area are you in?";

/// How a core attribute is asked about
#[derive(Debug, Clone, Copy)]
pub enum Prompt {
    /// Rotate through variants not yet asked, then repeat the fallback
    Rotating {
        variants: &'static [&'static str],
        fallback: &'static str,
    },
    /// Fixed text; `{location}` is replaced with the known location
    Template(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct CoreStep {
    pub key: CoreKey,
    pub prompt: Prompt,
}

pub const CORE_PLAN: &[CoreStep] = &[
    CoreStep {
        key: CoreKey::Location,
        prompt: Prompt::Rotating {
            variants: LOCATION_PROMPTS,
            fallback: LOCATION_FALLBACK,
        },
    },
    CoreStep {
        key: CoreKey::Timezone,
        prompt: Prompt::Template(
            "To help me time these emails better, could you let me know what timezone you're in?",
        ),
    },
    CoreStep {
        key: CoreKey::WeatherPreference,
        prompt: Prompt::Template(
            "How do you typically feel about the weather in {location}? Any favorite conditions?",
        ),
    },
    CoreStep {
        key: CoreKey::DailyRoutine,
        prompt: Prompt::Template(
            "Are you more of an early bird or a night owl? I want to make sure I'm catching you at a good time!",
        ),
    },
    CoreStep {
        key: CoreKey::LocalInterests,
        prompt: Prompt::Template(
            "What kind of local activities or spots do you enjoy in {location}?",
        ),
    },
    CoreStep {
        key: CoreKey::SeasonPreference,
        prompt: Prompt::Template(
            "With the weather patterns in {location}, do you have a favorite season? What makes it special?",
        ),
    },
];

/// Secondary topics as (user_info key, question), asked after the core
pub const SECONDARY_TOPICS: &[(&str, &str)] = &[
    (
        "name",
        "I'd love to know what you prefer to be called. What name should I use?",
    ),
    (
        "interests",
        "I'm curious about what interests you. What are some things you enjoy doing?",
    ),
    ("work", "What kind of work do you do?"),
    (
        "learning",
        "Is there anything specific you're learning or want to learn about lately?",
    ),
    (
        "goals",
        "Do you have any particular goals you're working towards?",
    ),
    (
        "news_preferences",
        "Are there specific types of news topics you're most interested in?",
    ),
    (
        "fun_facts",
        "Do you have any favorite topics for the random facts I share?",
    ),
];

/// What a question is trying to learn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Core(CoreKey),
    Secondary(&'static str),
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::Core(key) => write!(f, "{}", key),
            Topic::Secondary(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub topic: Topic,
    pub text: String,
}

/// Pick the next question to ask, or none.
pub fn next_question(profile: &Profile) -> Option<Question> {
    // Don't pile on while a question is still unanswered
    if profile.pending_question.is_some() {
        return None;
    }

    let core = &profile.core_attributes;
    if let Some(step) = CORE_PLAN.iter().find(|step| !core.is_known(step.key)) {
        let text = match step.prompt {
            Prompt::Rotating { variants, fallback } => variants
                .iter()
                .find(|q| !profile.questions_asked.contains(q))
                .copied()
                .unwrap_or(fallback)
                .to_string(),
            Prompt::Template(template) => {
                template.replace("{location}", profile.location().unwrap_or("your area"))
            }
        };
        return Some(Question {
            topic: Topic::Core(step.key),
            text,
        });
    }

    SECONDARY_TOPICS
        .iter()
        .find(|(topic, question)| {
            !profile.user_info.contains_key(*topic) && !profile.questions_asked.contains(question)
        })
        .map(|(topic, question)| Question {
            topic: Topic::Secondary(*topic),
            text: question.to_string(),
        })
}

/// Why `next_question` returned none, for reporting
pub fn skip_reason(profile: &Profile) -> &'static str {
    if profile.pending_question.is_some() {
        "pending question unanswered"
    } else {
        "nothing left to ask"
    }
}
