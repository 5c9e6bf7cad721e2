// Confirmation page rendering
//
// The landing page ships in Japanese and English; the confirmation page
// follows suit. Japanese is the default.

/// Languages the landing page is published in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    /// Japanese
    #[default]
    Ja,
    /// English
    En,
}

impl Language {
    /// Parse a language tag such as `en`, `en-US` or `ja-JP`
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.trim().split(['-', '_']).next()?.to_ascii_lowercase();
        match primary.as_str() {
            "ja" => Some(Language::Ja),
            "en" => Some(Language::En),
            _ => None,
        }
    }

    /// Pick the most preferred supported language from an `Accept-Language` header
    pub fn from_accept_language(header: &str) -> Option<Self> {
        let mut candidates: Vec<(f32, Language)> = header
            .split(',')
            .filter_map(|entry| {
                let mut parts = entry.split(';');
                let lang = Language::from_tag(parts.next()?)?;
                let quality = parts
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                (quality > 0.0).then_some((quality, lang))
            })
            .collect();
        // Stable sort keeps header order among equal weights.
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
        candidates.first().map(|(_, lang)| *lang)
    }

    /// Explicit `lang` parameter first, then the browser preference, then the default
    pub fn negotiate(query: Option<&str>, accept_language: Option<&str>) -> Self {
        query
            .and_then(Language::from_tag)
            .or_else(|| accept_language.and_then(Language::from_accept_language))
            .unwrap_or_default()
    }

    /// BCP 47 tag
    pub fn tag(self) -> &'static str {
        match self {
            Language::Ja => "ja",
            Language::En => "en",
        }
    }

    fn registration_complete(self) -> &'static str {
        match self {
            Language::Ja => "登録完了",
            Language::En => "Registration complete",
        }
    }
}

/// Static page shown after a successful confirmation
pub fn render_confirmation_page(lang: Language) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"{}\"><meta charset=\"utf-8\" /><body>{}</body></html>",
        lang.tag(),
        lang.registration_complete()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_page_is_japanese() {
        assert_eq!(
            render_confirmation_page(Language::default()),
            "<!DOCTYPE html><html lang=\"ja\"><meta charset=\"utf-8\" /><body>登録完了</body></html>"
        );
    }

    #[test]
    fn test_english_page() {
        let page = render_confirmation_page(Language::En);
        assert!(page.contains("lang=\"en\""));
        assert!(page.contains("Registration complete"));
    }

    #[test]
    fn test_tags() {
        assert_eq!(Language::from_tag("en-US"), Some(Language::En));
        assert_eq!(Language::from_tag("JA_jp"), Some(Language::Ja));
        assert_eq!(Language::from_tag("fr"), None);
        assert_eq!(Language::from_tag(""), None);
    }

    #[test]
    fn test_accept_language_weights() {
        assert_eq!(
            Language::from_accept_language("fr-FR, en;q=0.5, ja;q=0.8"),
            Some(Language::Ja)
        );
        assert_eq!(
            Language::from_accept_language("en-GB,en;q=0.9"),
            Some(Language::En)
        );
        assert_eq!(Language::from_accept_language("ja;q=0, de"), None);
    }

    #[test]
    fn test_negotiate_prefers_query() {
        assert_eq!(Language::negotiate(Some("en"), Some("ja")), Language::En);
        assert_eq!(Language::negotiate(Some("xx"), Some("en-US")), Language::En);
        assert_eq!(Language::negotiate(None, None), Language::Ja);
    }
}
