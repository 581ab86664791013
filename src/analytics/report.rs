use std::fmt::Write as _;
use std::path::Path;

use rayon::prelude::*;

use crate::error::ReportError;
use crate::state::{LongestPage, Snapshot};

pub const DEFAULT_TOP_WORDS: usize = 50;

/// Summary of a finished (or checkpointed) crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub unique_pages: usize,
    pub longest_page: Option<LongestPage>,
    /// Most frequent words, highest count first; ties in alphabetical order.
    pub top_words: Vec<(String, u64)>,
    /// `scheme://host` -> pages, ordered by origin.
    pub subdomains: Vec<(String, u64)>,
}

impl CrawlReport {
    pub fn from_snapshot(snapshot: &Snapshot, top_n: usize) -> Self {
        let mut words: Vec<(String, u64)> = snapshot
            .word_freq
            .iter()
            .map(|(word, count)| (word.clone(), *count))
            .collect();
        words.par_sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(top_n);

        Self {
            unique_pages: snapshot.visited.len(),
            longest_page: snapshot.longest_page.clone(),
            top_words: words,
            subdomains: snapshot
                .subdomains
                .iter()
                .map(|(origin, count)| (origin.clone(), *count))
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Unique pages: {}", self.unique_pages);
        match &self.longest_page {
            Some(page) => {
                let _ = writeln!(out, "Longest page: {} ({} words)", page.url, page.token_count);
            }
            None => out.push_str("Longest page: none\n"),
        }

        let _ = writeln!(out, "\nTop {} words:", self.top_words.len());
        for (i, (word, count)) in self.top_words.iter().enumerate() {
            let _ = writeln!(out, "{:>3}. {} - {}", i + 1, word, count);
        }

        let _ = writeln!(out, "\nSubdomains ({}):", self.subdomains.len());
        for (origin, count) in &self.subdomains {
            let _ = writeln!(out, "{}, {}", origin, count);
        }
        out
    }

    pub fn write_words_csv(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["word", "count"])?;
        for (word, count) in &self.top_words {
            writer.write_record([word.as_str(), count.to_string().as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_subdomains_csv(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["subdomain", "pages"])?;
        for (origin, count) in &self.subdomains {
            writer.write_record([origin.as_str(), count.to_string().as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot.visited = vec![
            "https://www.ics.uci.edu/".to_string(),
            "https://vision.ics.uci.edu/".to_string(),
            "https://www.ics.uci.edu/about".to_string(),
        ];
        for (word, count) in [("research", 9), ("faculty", 4), ("alumni", 4), ("zebra", 1)] {
            snapshot.word_freq.insert(word.to_string(), count);
        }
        snapshot.subdomains.insert("https://www.ics.uci.edu".to_string(), 2);
        snapshot.subdomains.insert("https://vision.ics.uci.edu".to_string(), 1);
        snapshot.longest_page = Some(LongestPage {
            url: "https://www.ics.uci.edu/about".to_string(),
            token_count: 12,
        });
        snapshot
    }

    #[test]
    fn words_are_ranked_by_count_then_alphabetically() {
        let report = CrawlReport::from_snapshot(&snapshot(), 3);
        assert_eq!(
            report.top_words,
            vec![
                ("research".to_string(), 9),
                ("alumni".to_string(), 4),
                ("faculty".to_string(), 4),
            ]
        );
        assert_eq!(report.unique_pages, 3);
    }

    #[test]
    fn subdomains_are_listed_by_origin() {
        let report = CrawlReport::from_snapshot(&snapshot(), DEFAULT_TOP_WORDS);
        assert_eq!(report.subdomains[0].0, "https://vision.ics.uci.edu");
        assert_eq!(report.subdomains[1], ("https://www.ics.uci.edu".to_string(), 2));
        assert_eq!(report.top_words.len(), 4);
    }

    #[test]
    fn render_mentions_every_section() {
        let text = CrawlReport::from_snapshot(&snapshot(), 2).render();
        assert!(text.contains("Unique pages: 3"));
        assert!(text.contains("Longest page: https://www.ics.uci.edu/about (12 words)"));
        assert!(text.contains("  1. research - 9"));
        assert!(text.contains("https://vision.ics.uci.edu, 1"));

        let empty = CrawlReport::default().render();
        assert!(empty.contains("Longest page: none"));
    }

    #[test]
    fn csv_exports_have_headers() {
        let dir = tempfile::tempdir().unwrap();
        let report = CrawlReport::from_snapshot(&snapshot(), 2);
        let words = dir.path().join("words.csv");
        let subdomains = dir.path().join("subdomains.csv");

        report.write_words_csv(&words).unwrap();
        report.write_subdomains_csv(&subdomains).unwrap();

        assert_eq!(
            std::fs::read_to_string(words).unwrap(),
            "word,count\nresearch,9\nalumni,4\n"
        );
        assert_eq!(
            std::fs::read_to_string(subdomains).unwrap(),
            "subdomain,pages\nhttps://vision.ics.uci.edu,1\nhttps://www.ics.uci.edu,2\n"
        );
    }
}
