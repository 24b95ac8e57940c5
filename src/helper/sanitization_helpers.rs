use std::collections::HashSet;

/// Strips all HTML tags from user-supplied text, leaving only the plain text
/// content. Applied to every free-text field before it reaches the database.
pub fn strip_all_html(input: &str) -> String {
    ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_removed_entirely() {
        assert_eq!(strip_all_html("Famille <b>sinistrée</b>"), "Famille sinistrée");
        assert_eq!(strip_all_html("<script>alert(1)</script>ok"), "ok");
        assert_eq!(strip_all_html("sans balise"), "sans balise");
    }
}
