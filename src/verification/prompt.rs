//! Prompt rendering for verification requests.

use crate::catalogue::BandDiscographyEntry;

pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are a metal music expert. Determine if the following band originates from Ukraine.

Band: {{bandName}}
Album: {{albumTitle}}

{{discography}}

RULES:
1. If a discography IS provided above, each entry is prefixed with a UUID in square brackets.
   It lists all known albums of a Ukrainian band with this name from Metal Archives.
   Multiple bands often share the same name.
   - If "{{albumTitle}}" matches or closely matches an entry in the discography, answer isUkrainian: true
     and return the UUID of the matched entry as matchedAlbumId.
   - Metal Archives often lists album titles in the band's native language (Ukrainian, Russian or
     other Cyrillic scripts) while distributors use an English translation or transliteration.
     Treat a Cyrillic title and its translation as the SAME album.
   - If "{{albumTitle}}" does NOT appear in the discography even after considering translations,
     this is most likely a DIFFERENT band with the same name: isUkrainian: false, matchedAlbumId: null.
2. If NO discography is provided, use your general knowledge of the metal scene to determine the
   band's country of origin. In this case matchedAlbumId must be null.

Consider the band's country of origin, not individual members' nationality.

Respond ONLY with JSON:
{"isUkrainian": true/false, "confidence": 0.0-1.0, "analysis": "brief reasoning", "matchedAlbumId": "exact-uuid-from-list-or-null"}
"#;

/// One `[id] title (type, year)` line per album, under a short header.
/// Empty when the band has no known discography.
pub fn format_discography(band_name: &str, entries: &[BandDiscographyEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut out = format!("Known discography of {} (Metal Archives):\n", band_name);
    for entry in entries {
        let details = match entry.year {
            Some(year) => format!("{}, {}", entry.album_type, year),
            None => entry.album_type.clone(),
        };
        out.push_str(&format!("[{}] {} ({})\n", entry.id, entry.album_title, details));
    }
    out
}

/// Substitutes placeholders in a single pass, so placeholder-like text in
/// scraped values is left alone.
pub fn render_prompt(
    template: &str,
    band_name: &str,
    album_title: &str,
    discography: &[BandDiscographyEntry],
) -> String {
    let discography = format_discography(band_name, discography);
    let placeholders = [
        ("{{bandName}}", band_name),
        ("{{albumTitle}}", album_title),
        ("{{discography}}", discography.as_str()),
    ];

    let mut out = String::with_capacity(template.len() + discography.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match placeholders.iter().find(|(p, _)| tail.starts_with(p)) {
            Some((placeholder, value)) => {
                out.push_str(value);
                rest = &tail[placeholder.len()..];
            }
            None => {
                out.push_str("{{");
                rest = &tail[2..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, title: &str, year: Option<i32>) -> BandDiscographyEntry {
        BandDiscographyEntry {
            id: id.to_string(),
            band_reference_id: "band".to_string(),
            album_title: title.to_string(),
            normalized_album_title: title.to_lowercase(),
            album_type: "Full-length".to_string(),
            year,
        }
    }

    #[test]
    fn test_render_substitutes_all_placeholders() {
        let prompt = render_prompt(
            DEFAULT_PROMPT_TEMPLATE,
            "Drudkh",
            "Autumn Aurora",
            &[entry("id-1", "Autumn Aurora", Some(2004))],
        );
        assert!(prompt.contains("Band: Drudkh"));
        assert!(prompt.contains("Album: Autumn Aurora"));
        assert!(prompt.contains("[id-1] Autumn Aurora (Full-length, 2004)"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_empty_discography_renders_nothing() {
        assert_eq!(format_discography("Drudkh", &[]), "");
        let prompt = render_prompt("{{bandName}}|{{discography}}|", "Drudkh", "x", &[]);
        assert_eq!(prompt, "Drudkh||");
    }

    #[test]
    fn test_entry_without_year() {
        let text = format_discography("Kroda", &[entry("id-2", "Fimbulvinter", None)]);
        assert!(text.ends_with("[id-2] Fimbulvinter (Full-length)\n"));
    }

    #[test]
    fn test_placeholder_text_inside_values_is_not_expanded() {
        let prompt = render_prompt("{{bandName}} / {{albumTitle}}", "{{albumTitle}}", "Real", &[]);
        assert_eq!(prompt, "{{albumTitle}} / Real");
    }
}
