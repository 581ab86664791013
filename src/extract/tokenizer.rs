use std::collections::{HashMap, HashSet};

/// Shortest token kept, in characters.
pub const MIN_TOKEN_LEN: usize = 3;

/// English stopwords excluded from every page's token stream.
pub const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "aren", "arent", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "cannot", "could", "couldn", "couldnt", "did", "didn", "didnt",
    "do", "does", "doesn", "doesnt", "doing", "don", "dont", "down", "during", "each", "few",
    "for", "from", "further", "had", "hadn", "hadnt", "has", "hasn", "hasnt", "have", "haven",
    "havent", "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how",
    "i", "if", "in", "into", "is", "isn", "isnt", "it", "its", "itself", "let", "lets", "me",
    "more", "most", "mustn", "mustnt", "my", "myself", "no", "nor", "not", "of", "off", "on",
    "once", "only", "or", "other", "ought", "our", "ours", "ourselves", "out", "over", "own",
    "same", "shan", "shant", "she", "should", "shouldn", "shouldnt", "so", "some", "such",
    "than", "that", "thats", "the", "their", "theirs", "them", "themselves", "then", "there",
    "theres", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "wasn", "wasnt", "we", "were", "weren", "werent", "what", "whats", "when",
    "where", "which", "while", "who", "whom", "why", "with", "won", "wont", "would", "wouldn",
    "wouldnt", "you", "your", "yours", "yourself", "yourselves",
];

/// Splits page text into lowercase alphanumeric tokens, dropping short
/// tokens and stopwords. Holds no per-page state.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    stopwords: HashSet<String>,
}

impl Tokenizer {
    pub fn new<I>(stopwords: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            stopwords: stopwords
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Lazily yields the filtered tokens of `text`.
    pub fn tokens<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|piece| !piece.is_empty())
            .map(str::to_lowercase)
            .filter(|token| token.chars().count() >= MIN_TOKEN_LEN)
            .filter(|token| !self.stopwords.contains(token))
    }

    pub fn frequencies(&self, text: &str) -> HashMap<String, u32> {
        token_frequencies(self.tokens(text))
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(STOPWORDS)
    }
}

pub fn token_frequencies<I>(tokens: I) -> HashMap<String, u32>
where
    I: IntoIterator<Item = String>,
{
    let mut counts = HashMap::new();
    for token in tokens {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}
