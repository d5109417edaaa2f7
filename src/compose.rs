//! Builds the outbound post text from an item.
//!
//! Templates use `{name}` placeholders:
//!
//! | placeholder   | value                                |
//! |---------------|--------------------------------------|
//! | `{title}`     | post title                           |
//! | `{flair}`     | link flair, empty when missing       |
//! | `{author}`    | author name                          |
//! | `{id}`        | post id                              |
//! | `{short_url}` | `https://redd.it/{id}`               |
//! | `{permalink}` | full URL of the post                 |
//!
//! Unknown placeholders are left untouched.

use crate::config::PostConfig;
use crate::source::Item;

/// Longest text the destination accepts, in characters.
pub const MAX_POST_LENGTH: usize = 300;
const PLACEHOLDER: &str = " [...]";

/// A hashtag inside [`ComposedPost::text`], as UTF-8 byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFacet {
    pub start: usize,
    pub end: usize,
    /// Tag without the leading `#`.
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPost {
    pub text: String,
    pub tags: Vec<TagFacet>,
}

fn placeholder_value(name: &str, item: &Item) -> Option<String> {
    match name {
        "title" => Some(item.title.clone()),
        "flair" => Some(item.flair.clone().unwrap_or_default()),
        "author" => Some(item.author.clone()),
        "id" => Some(item.id.clone()),
        "short_url" => Some(item.short_url()),
        "permalink" => Some(item.full_url()),
        _ => None,
    }
}

pub fn render_template(template: &str, item: &Item) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => match placeholder_value(&after[..close], item) {
                Some(value) => {
                    out.push_str(&value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            },
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Collapse whitespace and, if still longer than `width` characters, cut at
/// a word boundary and append ` [...]`.  Hyphenated words may be cut after
/// a hyphen.
pub fn shorten(text: &str, width: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let collapsed = words.join(" ");
    if collapsed.chars().count() <= width {
        return collapsed;
    }

    let budget = width.saturating_sub(PLACEHOLDER.chars().count());
    let pieces = words.iter().enumerate().flat_map(|(n, word)| {
        hyphen_pieces(word)
            .into_iter()
            .enumerate()
            .map(move |(k, piece)| (n > 0 && k == 0, piece))
    });
    let mut kept = String::new();
    let mut used = 0;
    for (spaced, piece) in pieces {
        let space = spaced && used > 0;
        let extra = piece.chars().count() + usize::from(space);
        if used + extra > budget {
            break;
        }
        if space {
            kept.push(' ');
        }
        kept.push_str(piece);
        used += extra;
    }

    let shortened = if kept.is_empty() {
        PLACEHOLDER.trim_start().to_string()
    } else {
        kept + PLACEHOLDER
    };
    // Only reachable when `width` cannot even hold the placeholder.
    shortened.chars().take(width).collect()
}

/// Split `word` after every hyphen that joins two words: two letters
/// before it, and two letters after it (a single hyphen between those
/// is allowed).  `well-known` gives `well-` and `known`; `-bar` and `x-1`
/// stay whole.
fn hyphen_pieces(word: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = word.char_indices().collect();
    let char_is = |i: usize, test: fn(char) -> bool| chars.get(i).is_some_and(|&(_, c)| test(c));
    let letter = |c: char| c.is_alphabetic() || c == '_';
    let hyphen = |c: char| c == '-';

    let mut pieces = Vec::new();
    let mut start = 0;
    for (i, &(at, c)) in chars.iter().enumerate() {
        let joins_words = c == '-'
            && i >= 2
            && char_is(i - 2, letter)
            && char_is(i - 1, letter)
            && char_is(i + 1, letter)
            && (char_is(i + 2, letter) || (char_is(i + 2, hyphen) && char_is(i + 3, letter)));
        if joins_words {
            let end = at + c.len_utf8();
            pieces.push(&word[start..end]);
            start = end;
        }
    }
    pieces.push(&word[start..]);
    pieces
}

/// Hashtags rendered from their templates; empty ones are dropped and
/// inner whitespace removed.
pub fn render_hashtags(templates: &[String], item: &Item) -> Vec<String> {
    templates
        .iter()
        .map(|t| {
            render_template(t, item)
                .split_whitespace()
                .collect::<String>()
        })
        .map(|t| t.trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn compose_post(item: &Item, config: &PostConfig) -> ComposedPost {
    let hashtags = render_hashtags(&config.hashtags, item);

    // "#a #b": the tags, the spaces between them, one '#' each.
    let tags_length = hashtags.iter().map(|t| t.chars().count()).sum::<usize>()
        + hashtags.len().saturating_sub(1)
        + hashtags.len();
    let separator_length = if hashtags.is_empty() {
        0
    } else {
        config.separator.chars().count()
    };
    let remaining = MAX_POST_LENGTH.saturating_sub(tags_length + separator_length);

    let mut text = shorten(&render_template(&config.text_template, item), remaining);
    let mut tags = Vec::with_capacity(hashtags.len());
    if !hashtags.is_empty() {
        text.push_str(&config.separator);
    }
    for (i, tag) in hashtags.into_iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        let start = text.len();
        text.push('#');
        text.push_str(&tag);
        tags.push(TagFacet {
            start,
            end: text.len(),
            tag,
        });
    }

    ComposedPost { text, tags }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::make_item;

    fn podcast_item() -> Item {
        let mut item = make_item("1abcde", "[Comedy] The Weekly Laugh");
        item.flair = Some("Comedy".into());
        item
    }

    #[test]
    fn renders_known_placeholders() {
        let item = podcast_item();
        assert_eq!(
            render_template("({flair}) {title} {short_url}", &item),
            "(Comedy) [Comedy] The Weekly Laugh https://redd.it/1abcde"
        );
        assert_eq!(render_template("{nope} {title}", &item), "{nope} [Comedy] The Weekly Laugh");
    }

    #[test]
    fn missing_flair_renders_empty() {
        let item = make_item("x", "Title");
        assert_eq!(render_template("({flair}) {title}", &item), "() Title");
    }

    #[test]
    fn shorten_keeps_short_text() {
        assert_eq!(shorten("hello   world\n", 20), "hello world");
    }

    #[test]
    fn shorten_cuts_at_word_boundary() {
        assert_eq!(shorten("Hello world, this is long", 17), "Hello [...]");
        assert_eq!(shorten("Hello world, this is long", 18), "Hello world, [...]");
    }

    #[test]
    fn shorten_with_huge_first_word() {
        assert_eq!(shorten(&"x".repeat(50), 10), "[...]");
        assert_eq!(shorten("abc def", 3), "[..");
    }

    #[test]
    fn shorten_may_cut_after_a_hyphen() {
        assert_eq!(shorten("a well-known thing here", 13), "a well- [...]");
        assert_eq!(shorten("a well-known thing here", 12), "a [...]");
        assert_eq!(shorten("long-winded-title-text goes on", 20), "long-winded- [...]");
    }

    #[test]
    fn stray_hyphens_are_not_break_points() {
        assert_eq!(shorten("foo -bar baz-", 12), "foo [...]");
        assert_eq!(hyphen_pieces("-bar"), ["-bar"]);
        assert_eq!(hyphen_pieces("baz-"), ["baz-"]);
        assert_eq!(hyphen_pieces("x-ray"), ["x-ray"]);
        assert_eq!(hyphen_pieces("covid-19"), ["covid-19"]);
        assert_eq!(hyphen_pieces("state-of-the-art"), ["state-", "of-", "the-", "art"]);
    }

    #[test]
    fn composes_text_and_hashtags() {
        let config = PostConfig::default();
        let post = compose_post(&podcast_item(), &config);

        assert_eq!(post.text, "(Comedy) [Comedy] The Weekly Laugh\n\n#ShareAPodcast");
        assert_eq!(post.tags.len(), 1);
        let facet = &post.tags[0];
        assert_eq!(&post.text[facet.start..facet.end], "#ShareAPodcast");
        assert_eq!(facet.tag, "ShareAPodcast");
    }

    #[test]
    fn multiple_hashtags_are_space_separated() {
        let config = PostConfig {
            hashtags: vec!["Podcasts".into(), "{flair}".into()],
            ..PostConfig::default()
        };
        let post = compose_post(&podcast_item(), &config);

        assert!(post.text.ends_with("\n\n#Podcasts #Comedy"));
        let rendered: Vec<&str> = post.tags.iter().map(|f| &post.text[f.start..f.end]).collect();
        assert_eq!(rendered, vec!["#Podcasts", "#Comedy"]);
    }

    #[test]
    fn empty_hashtags_are_dropped() {
        let config = PostConfig {
            hashtags: vec!["{flair}".into()],
            ..PostConfig::default()
        };
        let post = compose_post(&make_item("x", "Title"), &config);
        assert!(post.tags.is_empty());
        assert_eq!(post.text, "() Title");
    }

    #[test]
    fn long_titles_fit_the_limit() {
        let title = format!("[Tech] {}", "word ".repeat(200));
        let item = make_item("x", &title);
        let config = PostConfig::default();

        let post = compose_post(&item, &config);

        assert!(post.text.chars().count() <= MAX_POST_LENGTH);
        assert!(post.text.contains("[...]\n\n#ShareAPodcast"));
    }

    #[test]
    fn facets_use_byte_offsets() {
        let item = make_item("x", "Café ☕ talk");
        let config = PostConfig {
            text_template: "{title}".into(),
            ..PostConfig::default()
        };
        let post = compose_post(&item, &config);
        let facet = &post.tags[0];
        assert_eq!(&post.text[facet.start..facet.end], "#ShareAPodcast");
    }
}
