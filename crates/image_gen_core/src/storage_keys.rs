use crate::artifact::ImageFormat;

pub const DEFAULT_KEY_PREFIX: &str = "generated_images";
pub const MAX_SLUG_CHARS: usize = 64;

/// Object key for one generated artifact.
///
/// `object_id` must be fresh per request; it is the only part of the key that
/// guarantees two identical prompts never share a key.
pub fn artifact_object_key(
    base_prefix: &str,
    generated_at: &str,
    object_id: &str,
    prompt: &str,
    format: ImageFormat,
) -> String {
    let trimmed = base_prefix.trim_matches('/');
    let prefix = if trimmed.is_empty() {
        DEFAULT_KEY_PREFIX
    } else {
        trimmed
    };
    format!(
        "{prefix}/{generated_at}_{object_id}/image_{}.{}",
        prompt_slug(prompt),
        format.extension(),
    )
}

/// Filesystem- and URL-friendly rendition of a prompt for use in object names.
pub fn prompt_slug(prompt: &str) -> String {
    let mut slug = String::new();
    let mut pending_separator = false;

    for character in prompt.chars() {
        if character.is_whitespace() {
            pending_separator = !slug.is_empty();
            continue;
        }
        if !(character.is_alphanumeric() || character == '_' || character == '-') {
            continue;
        }
        if pending_separator {
            slug.push('_');
            pending_separator = false;
        }
        slug.push(character);
    }

    let slug: String = slug.chars().take(MAX_SLUG_CHARS).collect();
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        "prompt".to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_artifact_key_with_timestamp_and_id() {
        let key = artifact_object_key(
            "generated_images/",
            "20260214093000",
            "4f1c2a",
            "a red fox",
            ImageFormat::Png,
        );

        assert_eq!(
            key,
            "generated_images/20260214093000_4f1c2a/image_a_red_fox.png"
        );
    }

    #[test]
    fn empty_prefix_falls_back_to_default() {
        let key = artifact_object_key("/", "20260214093000", "id", "fox", ImageFormat::Jpeg);
        assert_eq!(key, "generated_images/20260214093000_id/image_fox.jpg");
    }

    #[test]
    fn slug_collapses_whitespace_and_drops_separators() {
        assert_eq!(prompt_slug("  a   red\tfox  "), "a_red_fox");
        assert_eq!(prompt_slug("../etc/passwd?x=1"), "etcpasswdx1");
        assert_eq!(prompt_slug("赤い 狐"), "赤い_狐");
        assert_eq!(prompt_slug("!!!"), "prompt");
    }

    #[test]
    fn slug_is_truncated() {
        let slug = prompt_slug(&"fox ".repeat(40));
        assert_eq!(slug, "fox_".repeat(16).trim_end_matches('_'));
        assert!(slug.chars().count() < MAX_SLUG_CHARS);
        assert!(!slug.ends_with('_'));
        assert!(!slug.contains('/'));

        let unbroken = prompt_slug(&"x".repeat(100));
        assert_eq!(unbroken.chars().count(), MAX_SLUG_CHARS);
    }
}
