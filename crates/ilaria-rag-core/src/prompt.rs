//! Grounded prompt assembly.
//!
//! The prompt combines three blocks: retrieved context labelled by rank,
//! the tail of the conversation labelled by speaker, and the live query.

use crate::models::{ConversationTurn, Role, SearchResult};

/// How many trailing conversation turns are shown to the model.
pub const HISTORY_TURNS: usize = 5;

/// Placeholder for the history block when there is no prior conversation.
const NO_HISTORY: &str = "არ არის";

/// Render the context block: one labelled entry per retrieved chunk, in
/// rank order.
pub fn context_block(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[დოკუმენტი {}]:\n{}", i + 1, r.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render the last [`HISTORY_TURNS`] turns in chronological order.
pub fn history_block(history: &[ConversationTurn]) -> String {
    let start = history.len().saturating_sub(HISTORY_TURNS);
    let lines: Vec<String> = history[start..]
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                Role::User => "მომხმარებელი",
                Role::Assistant => "ასისტენტი",
            };
            format!("{}: {}", speaker, turn.content)
        })
        .collect();

    if lines.is_empty() {
        NO_HISTORY.to_string()
    } else {
        lines.join("\n")
    }
}

/// Fill the fixed assistant template.
pub fn build_prompt(context: &str, history: &str, query: &str) -> String {
    format!(
        "შენ ხარ ilaria აპლიკაციის დამხმარე AI ასისტენტი. \
უპასუხე მომხმარებლის კითხვას მხოლოდ ქვემოთ მოცემული კონტექსტის საფუძველზე. \
უპასუხე მკაფიოდ, სტრუქტურირებულად და მაქსიმალურად სასარგებლოდ. \
თუ პასუხი კონტექსტში არ არის, გულწრფელად თქვი, რომ ეს ინფორმაცია არ გაქვს. \
თუ კითხვა ინგლისურად არის დასმული, უპასუხე ინგლისურად, სხვა შემთხვევაში კი ქართულად.\n\n\
კონტექსტი:\n{context}\n\n\
საუბრის ისტორია:\n{history}\n\n\
მომხმარებლის კითხვა: {query}\n\n\
პასუხი:"
    )
}
