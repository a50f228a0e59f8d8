use ammonia::Builder;

/// Strip all HTML from user-supplied display text.
///
/// Guest names and quiz names end up on the public leaderboard and quiz
/// catalog, so they are reduced to plain text with an empty tag whitelist.
/// This serves as a fail-safe against Stored XSS in any client that renders
/// them as HTML.
pub fn clean_text(input: &str) -> String {
    Builder::empty().clean(input).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags() {
        let cleaned = clean_text("alice<script>alert(1)</script>");
        assert_eq!(cleaned, "alice");
    }

    #[test]
    fn strips_formatting_tags_but_keeps_text() {
        let cleaned = clean_text("<b>bob</b>");
        assert_eq!(cleaned, "bob");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(clean_text("carol_42"), "carol_42");
    }
}
