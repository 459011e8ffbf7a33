/*!
 * Command-line Classifier
 *
 * Extracts the canonical source-file path that a spawn is compiling, so
 * equivalent invocations from different directories collapse to the
 * same profile key. Total and idempotent: any input yields at most one
 * path, and classifying a classified path yields it unchanged.
 */

/// Token-scanning source-path extractor
#[derive(Debug, Clone)]
pub struct Classifier {
    suffixes: Vec<String>,
}

impl Classifier {
    /// Build a classifier over the given source-file suffixes
    pub fn new(suffixes: Vec<String>) -> Self {
        Self { suffixes }
    }

    /// Extract the source path from an argv/cmdline string
    ///
    /// Keeps the last whitespace-separated token that ends in a
    /// recognized suffix and contains a directory separator; a path
    /// without a separator is indistinguishable from a flag value and
    /// is skipped. Leading `../` segments are stripped from the result.
    pub fn classify(&self, text: &str) -> Option<String> {
        let mut found: Option<&str> = None;
        for raw in text.split_whitespace() {
            // An opening double-quote is also a left token boundary
            let token = raw.strip_prefix('"').unwrap_or(raw);
            if !self.has_source_suffix(token) {
                continue;
            }
            if !token.contains('/') {
                continue;
            }
            found = Some(token);
        }
        found.map(strip_parent_prefixes).map(str::to_string)
    }

    /// Classify a spawn's argument vector
    pub fn classify_argv<S: AsRef<str>>(&self, argv: &[S]) -> Option<String> {
        let joined = argv
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        self.classify(&joined)
    }

    fn has_source_suffix(&self, token: &str) -> bool {
        self.suffixes.iter().any(|s| token.ends_with(s.as_str()))
    }
}

/// Strip leading `../` segments so builds invoked from different
/// directories share one profile key
fn strip_parent_prefixes(mut path: &str) -> &str {
    while let Some(rest) = path.strip_prefix("../") {
        path = rest;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DEFAULT_SUFFIXES;
    use pretty_assertions::assert_eq;

    fn classifier() -> Classifier {
        Classifier::new(DEFAULT_SUFFIXES.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn extracts_source_path() {
        let c = classifier();
        assert_eq!(
            c.classify("g++ -O2 -c src/widget.cpp -o widget.o"),
            Some("src/widget.cpp".to_string())
        );
    }

    #[test]
    fn keeps_last_candidate() {
        let c = classifier();
        assert_eq!(
            c.classify("cc a/first.c b/second.c"),
            Some("b/second.c".to_string())
        );
    }

    #[test]
    fn requires_directory_separator() {
        let c = classifier();
        assert_eq!(c.classify("cc -c lonely.c"), None);
        assert_eq!(c.classify("cc -DNAME=thing.cpp"), None);
    }

    #[test]
    fn strips_parent_segments() {
        let c = classifier();
        assert_eq!(
            c.classify("g++ -c ../../src/a.cpp"),
            Some("src/a.cpp".to_string())
        );
    }

    #[test]
    fn leading_quote_is_a_boundary() {
        let c = classifier();
        assert_eq!(
            c.classify("g++ -c \"src/a.cpp"),
            Some("src/a.cpp".to_string())
        );
    }

    #[test]
    fn suffix_must_terminate_the_token() {
        let c = classifier();
        assert_eq!(c.classify("g++ -c src/a.cpp.bak"), None);
        assert_eq!(c.classify("g++ -Isrc/include a/real.cc"), Some("a/real.cc".to_string()));
    }

    #[test]
    fn classification_is_idempotent() {
        let c = classifier();
        let first = c.classify("g++ -c ../src/a.cpp -o a.o").unwrap();
        assert_eq!(c.classify(&first), Some(first.clone()));
    }

    #[test]
    fn argv_form_matches_joined_form() {
        let c = classifier();
        let argv = ["g++", "-c", "src/a.cpp", "-o", "a.o"];
        assert_eq!(c.classify_argv(&argv), Some("src/a.cpp".to_string()));
    }

    #[test]
    fn custom_suffixes_extend_recognition() {
        let c = Classifier::new(vec![".rs".to_string()]);
        assert_eq!(
            c.classify("rustc --edition 2021 src/main.rs"),
            Some("src/main.rs".to_string())
        );
        assert_eq!(c.classify("g++ -c src/a.cpp"), None);
    }
}
