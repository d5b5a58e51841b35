// src/scoring/keywords.rs
//! Default lexicons and whole-word keyword matching.

use regex::Regex;

pub const AI_ML_HIGH: &[&str] = &[
    "llm",
    "large language model",
    "gpt",
    "claude",
    "openai",
    "machine learning engineer",
    "ml engineer",
    "ai engineer",
    "deep learning",
    "neural network",
    "transformer",
    "rag",
    "retrieval augmented generation",
    "langchain",
    "llama",
    "bert",
    "embeddings",
    "mlops",
    "model serving",
    "ml platform",
];

pub const AI_ML_MEDIUM: &[&str] = &[
    "machine learning",
    "ai",
    "artificial intelligence",
    "nlp",
    "natural language processing",
    "computer vision",
    "data science",
    "pytorch",
    "tensorflow",
    "scikit-learn",
    "hugging face",
    "ml",
    "model training",
    "inference",
];

pub const AI_ML_LOW: &[&str] = &[
    "python",
    "statistics",
    "data",
    "analytics",
    "algorithm",
    "optimization",
    "prediction",
];

pub const FINTECH: &[&str] = &[
    "bank",
    "banking",
    "fintech",
    "financial services",
    "payment",
    "payments",
    "trading",
    "credit",
    "lending",
    "insurance",
    "fraud detection",
    "aml",
    "kyc",
    "compliance",
    "deutsche bank",
    "jpmorgan",
    "goldman sachs",
    "visa",
    "mastercard",
    "paypal",
    "stripe",
];

pub fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// Compiled keyword list. Matching is case-insensitive and bounded by
/// non-alphanumerics, so "ml" never hits inside "html".
#[derive(Debug, Clone)]
pub struct KeywordSet {
    entries: Vec<(String, Regex)>,
}

impl KeywordSet {
    pub fn compile(words: &[String]) -> Result<Self, regex::Error> {
        let mut entries = Vec::with_capacity(words.len());
        let mut seen = std::collections::HashSet::new();
        for w in words {
            let w = w.trim().to_lowercase();
            if w.is_empty() || !seen.insert(w.clone()) {
                continue;
            }
            let re = Regex::new(&format!(
                r"(?i)(?:^|[^\p{{Alphabetic}}\p{{N}}]){}(?:$|[^\p{{Alphabetic}}\p{{N}}])",
                regex::escape(&w)
            ))?;
            entries.push((w, re));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct keywords present in `text`, in lexicon order.
    pub fn matches<'a>(&'a self, text: &str) -> Vec<&'a str> {
        self.entries
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(w, _)| w.as_str())
            .collect()
    }

    pub fn count(&self, text: &str) -> usize {
        self.entries.iter().filter(|(_, re)| re.is_match(text)).count()
    }
}
