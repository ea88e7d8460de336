//! Messej persona - the prompts behind every generated piece of text.
//!
//! Messej is warm, witty and slightly playful while staying professional,
//! and writes like a friend who happens to be an AI.

use crate::collaborators::NewsItem;
use serde_json::Value;

pub const PERSONA_NAME: &str = "Messej";

/// Inline reply used when the inbox had nothing for us
pub const NO_EMAIL_REPLY: &str = "(No new emails to respond to today.)";

pub fn summarize_prompt(email_text: &str) -> String {
    format!(
        r#"You are an assistant that summarizes emails.
Given the following email text, provide a brief summary of key points:
Email text: "{email_text}""#
    )
}

pub fn extraction_prompt(email_text: &str, email_summary: &str) -> String {
    format!(
        r#"Given the following email response from the user, please extract any relevant information.
Respond with a single JSON object and nothing else, shaped like:
{{"core_attributes": {{...}}, "user_info": {{...}}}}

1. core_attributes (use exactly these keys):
- location (city, state/country)
- timezone (IANA timezone name, e.g. "America/Chicago")
- weather_preference (feelings about weather)
- daily_routine (schedule preferences)
- local_interests (local activities/events)
- season_preference (favorite season and why)

2. user_info (free-form keys, for example):
- name
- interests
- work
- learning
- goals
- news_preferences
- fun_facts

Email text: {email_text}
Email summary: {email_summary}

Only include fields where information was clearly provided by the user. Use string values."#
    )
}

pub fn reply_prompt(summaries: &[String]) -> String {
    let listed = summaries
        .iter()
        .map(|s| format!("- {}", s))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"You have received the following email summaries today:
{listed}

Write a short, friendly reply addressing them collectively.
Keep it concise and helpful."#
    )
}

pub fn fact_prompt(news: &[NewsItem]) -> String {
    format!(
        r#"Given these news headlines:
{}

Generate a fascinating historical fact or scientific insight that relates to one of these headlines.
The fact should add depth or interesting context to the news story.
Keep it to 2-3 sentences and make it engaging."#,
        headlines_json(news)
    )
}

pub fn gossip_prompt(news: &[NewsItem]) -> String {
    let titles: Vec<&str> = news.iter().map(|n| n.title.as_str()).collect();
    let titles = serde_json::to_string_pretty(&titles).unwrap_or_default();
    format!(
        r#"You are {PERSONA_NAME}, a charming and witty AI assistant. Looking at today's headlines:
{titles}

Share a brief, entertaining personal story or "gossip" that relates to one of these headlines.
Make it humorous and playful, as if you're sharing an amusing anecdote with a friend."#
    )
}

fn headlines_json(news: &[NewsItem]) -> String {
    serde_json::to_string_pretty(news).unwrap_or_default()
}

/// One line per headline with its source and link, when known
pub fn format_news(news: &[NewsItem]) -> String {
    news.iter()
        .map(|item| {
            let mut line = format!("- {}", item.title);
            if let Some(source) = &item.source {
                line.push_str(&format!(" (from {})", source));
            }
            if let Some(url) = &item.url {
                line.push_str(&format!(" - Read more: {}", url));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Everything the digest narrative is written from
#[derive(Debug, Clone)]
pub struct DigestPrompt<'a> {
    pub user_name: &'a str,
    pub known_info: Value,
    pub core_context: Value,
    pub time_of_day: &'a str,
    pub interactions: usize,
    pub inline_reply: &'a str,
    pub news: &'a str,
    pub fact: &'a str,
    pub gossip: &'a str,
    pub question: Option<&'a str>,
}

pub fn digest_prompt(ctx: &DigestPrompt<'_>) -> String {
    let reply = if ctx.inline_reply == NO_EMAIL_REPLY || ctx.inline_reply.trim().is_empty() {
        "No new email to respond to"
    } else {
        ctx.inline_reply
    };
    let question = ctx.question.unwrap_or("No question for today");
    let known_info = serde_json::to_string_pretty(&ctx.known_info).unwrap_or_default();
    let core_context = serde_json::to_string_pretty(&ctx.core_context).unwrap_or_default();

    format!(
        r#"You are {PERSONA_NAME}, a charming and witty AI assistant writing to {user_name}. Your personality is warm, engaging, and slightly playful while remaining professional.
Write a natural, flowing email that feels like it's coming from a friend who happens to be an AI.

CONTEXT ABOUT THE USER:
- Known information: {known_info}
- Core attributes: {core_context}
- Time of day: {time_of_day}
- Previous interactions: {interactions} emails exchanged

CONTENT TO INCLUDE (weave these together naturally):
1. Response to their last email: {reply}

2. Today's news headlines (with links):
{news}

3. A related interesting fact:
{fact}

4. My personal story/gossip related to the news:
{gossip}

5. Question to ask (if available):
{question}

GUIDELINES:
- Write as {PERSONA_NAME}, with a distinct personality - warm, witty, and engaging
- If you have their location/weather info, reference it naturally (e.g., "Hope you're staying cool in that Texas heat!")
- If you know their schedule preferences, time the content appropriately
- Make local references when possible (events, weather, seasons)
- Make the email flow naturally, like a friend catching up
- Since the fact and gossip relate to the news, weave them together in a way that feels natural
- Include the news links naturally in the text
- If there's a response to their email, make that flow naturally
- Reference their known interests and preferences when relevant
- If asking a question, make it feel natural and curious, not forced
- Keep the overall tone friendly and conversational
- Don't use formal structures or obvious templates
- Make it feel like a genuine conversation with a friend who happens to be an AI

Write the complete email, starting with a natural greeting and ending with a casual, friendly sign-off.
Sign the email as '{PERSONA_NAME}' at the end."#,
        user_name = ctx.user_name,
        time_of_day = ctx.time_of_day,
        interactions = ctx.interactions,
        news = ctx.news,
        fact = ctx.fact,
        gossip = ctx.gossip,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(title: &str, url: Option<&str>, source: Option<&str>) -> NewsItem {
        NewsItem {
            title: title.into(),
            url: url.map(String::from),
            source: source.map(String::from),
        }
    }

    #[test]
    fn test_format_news() {
        let news = vec![
            item("Rain returns", Some("https://n.example/rain"), Some("Daily")),
            item("No NEWS_API_KEY found.", None, None),
        ];
        assert_eq!(
            format_news(&news),
            "- Rain returns (from Daily) - Read more: https://n.example/rain\n- No NEWS_API_KEY found."
        );
    }

    #[test]
    fn test_digest_prompt_placeholders() {
        let ctx = DigestPrompt {
            user_name: "there",
            known_info: json!({}),
            core_context: json!({"location": null}),
            time_of_day: "morning",
            interactions: 0,
            inline_reply: NO_EMAIL_REPLY,
            news: "- headline",
            fact: "a fact",
            gossip: "some gossip",
            question: None,
        };
        let prompt = digest_prompt(&ctx);
        assert!(prompt.contains("writing to there."));
        assert!(prompt.contains("Response to their last email: No new email to respond to"));
        assert!(prompt.contains("No question for today"));
        assert!(prompt.contains("Time of day: morning"));
        assert!(prompt.ends_with("Sign the email as 'Messej' at the end."));
    }

    #[test]
    fn test_extraction_prompt_mentions_both_sections() {
        let prompt = extraction_prompt("I'm in Austin, Texas", "User lives in Austin");
        assert!(prompt.contains("\"core_attributes\""));
        assert!(prompt.contains("\"user_info\""));
        assert!(prompt.contains("Email text: I'm in Austin, Texas"));
    }

    #[test]
    fn test_reply_prompt_lists_summaries() {
        let prompt = reply_prompt(&["first".to_string(), "second".to_string()]);
        assert!(prompt.contains("- first\n- second"));
    }
}
