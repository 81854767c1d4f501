//! Prompt templates for each oracle intent.

use crate::oracle::Category;

pub const CLASSIFIER_SYSTEM: &str = "You are a strict classifier.";

pub const LINK_FINDER_SYSTEM: &str = "You extract unsubscribe links from marketing emails. You answer with a single URL or the word NONE.";

pub const JUDGE_SYSTEM: &str = "You decide whether an unsubscribe attempt succeeded by reading the resulting web page. You answer only with JSON.";

pub const PLANNER_SYSTEM: &str = "You plan browser interactions that complete an unsubscribe flow. You answer only with JSON.";

pub fn categorize(body: &str, categories: &[Category]) -> String {
    let listing = categories
        .iter()
        .map(|c| format!("{}: {}", c.name, c.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Given the following categories (format: Name: Description):\n\n\
         {listing}\n\n\
         Classify the following email into **one** of the categories above.\n\n\
         Email:\n{body}\n\n\
         Return only the category name exactly as written in the list above:\n\
         - No description\n\
         - No punctuation\n\
         - No new lines\n\
         - No explanations or additional text\n\n\
         Output only the exact category name string from the list."
    )
}

pub fn summarize(body: &str) -> String {
    format!("Summarize this email in 1-2 sentences:\n\n{body}")
}

pub fn find_unsubscribe_link(pruned_body: &str) -> String {
    format!(
        "Find the link a recipient would follow to unsubscribe from this email.\n\n\
         Email HTML:\n{pruned_body}\n\n\
         Rules:\n\
         - Answer with the complete URL exactly as it appears in the href, including every query parameter.\n\
         - Do not shorten, decode or re-encode the URL.\n\
         - Only http:// or https:// links count.\n\
         - If there is no unsubscribe link, answer NONE.\n\
         - No explanations or additional text."
    )
}

pub fn judge_outcome(page_text: &str, context: &str) -> String {
    format!(
        "An automated unsubscribe attempt ({context}) produced the page below.\n\n\
         Page text:\n{page_text}\n\n\
         Decide whether the user is now unsubscribed.\n\
         - \"success\": the page confirms the unsubscribe or opt-out.\n\
         - \"failure\": the page reports an error, an expired or invalid link, or a refusal.\n\
         - \"inconclusive\": the page still asks for input, or says nothing definite.\n\n\
         Respond with exactly one JSON object and nothing else:\n\
         {{\"status\": \"success\" | \"failure\" | \"inconclusive\", \"reason\": \"<one sentence>\"}}"
    )
}

pub fn plan_actions(interactive: &str, pruned_html: &str, context: &str) -> String {
    format!(
        "An unsubscribe page was loaded ({context}). Decide whether a browser can finish \
         the unsubscribe, and if so, list the steps.\n\n\
         Interactive elements:\n{interactive}\n\n\
         Page HTML (pruned):\n{pruned_html}\n\n\
         Each step is a string \"verb:selector\" or \"verb:selector:value\" where:\n\
         - verb is click, fill or submit\n\
         - selector is a CSS selector matching the element in the HTML above\n\
         - for click, value is the exact visible text of the element to pick among matches\n\
         - for fill, value is the text to type\n\n\
         Respond with exactly one JSON object and nothing else:\n\
         {{\"can_automate\": true | false, \"actions\": [\"click:button[type=submit]\"], \"reason\": \"<one sentence>\"}}\n\
         Use an empty actions list when nothing needs to be clicked or filled."
    )
}
