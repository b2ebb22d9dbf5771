//! Fallback Answer Synthesizer
//!
//! Canned answers used whenever the service cannot produce a real one, so a
//! submitted question never goes unanswered.

use rand::seq::SliceRandom;
use rand::Rng;

/// Answer for greetings
pub const GREETING_ANSWER: &str = "Hello there! I'm EduBot, your intelligent assistant 🤖 \
I can help you analyze documents and answer your questions. How can I help you today? ✨";

/// Answer for questions about documents
pub const DOCUMENT_ANSWER: &str = "I can analyze PDF files using retrieval-augmented generation! \
Upload a PDF file and I'll be able to answer questions about its content with high accuracy 📄";

/// Answer for "how does this work"
pub const HOW_IT_WORKS_ANSWER: &str = "I work by combining several technologies:\n\n\
• Document Processing: Extract and index content from PDFs\n\
• Retrieval: Find the passages relevant to your question\n\
• Natural Language: Understand context and answer in plain language\n\
• Memory: Keep track of the conversation\n\n\
What would you like to know more about? 🤖";

/// Pool used when no rule matches
pub const GENERAL_ANSWERS: [&str; 3] = [
    "Great question! Once the service is reachable I'll search through your uploaded documents \
to give you the most accurate answer possible 🎯",
    "Happy to help! With access to your PDF files I can provide detailed insights on this topic 📖",
    "Excellent question! I use natural language processing to understand your queries and \
retrieve relevant information ✨",
];

const GREETING_WORDS: [&str; 3] = ["hello", "hi", "hey"];
const DOCUMENT_WORDS: [&str; 3] = ["pdf", "document", "file"];

/// Pick a fallback answer for `text`
///
/// Greetings match as whole words rather than substrings, unlike the
/// document and how-it-works keywords, so "how does this work" is not a
/// greeting.
#[must_use]
pub fn synthesize(text: &str) -> String {
    synthesize_with(text, &mut rand::thread_rng())
}

/// Pick a fallback answer using the given RNG for the general pool
pub fn synthesize_with<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let query = text.to_lowercase();

    if is_greeting(&query) {
        return GREETING_ANSWER.to_string();
    }
    if DOCUMENT_WORDS.iter().any(|w| query.contains(w)) {
        return DOCUMENT_ANSWER.to_string();
    }
    if (query.contains("how") && query.contains("work"))
        || (query.contains("what") && query.contains("do"))
    {
        return HOW_IT_WORKS_ANSWER.to_string();
    }

    GENERAL_ANSWERS
        .choose(rng)
        .copied()
        .unwrap_or(GENERAL_ANSWERS[0])
        .to_string()
}

/// Greeting words must stand alone ("this" does not greet)
fn is_greeting(query: &str) -> bool {
    query
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| GREETING_WORDS.contains(&word))
}
