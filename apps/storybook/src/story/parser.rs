//! Story text parsing — trailing visual-tag JSON and page splitting.
//!
//! The model is asked to start each page with `PAGE_MARKER` and to append a
//! `{"colors": [...], "objects": [...]}` block. Neither is guaranteed:
//! - invalid tag JSON is dropped and the full text is kept as the story
//! - text without any marker becomes a single page
//!
//! The result is always padded/truncated to the requested page count.

use tracing::{debug, warn};

use crate::models::story::{fit_pages, VisualTags};
use crate::story::prompts::PAGE_MARKER;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStory {
    pub pages: Vec<String>,
    pub visual_tags: Option<VisualTags>,
}

pub fn parse_story_text(raw: &str, page_count: u32) -> ParsedStory {
    let (content, visual_tags) = split_visual_tags(raw);
    let pages = fit_pages(split_pages(content), page_count as usize);
    ParsedStory { pages, visual_tags }
}

/// Separates the trailing tag block (last `{` to last `}`) from the story body.
pub fn split_visual_tags(raw: &str) -> (&str, Option<VisualTags>) {
    let (Some(start), Some(end)) = (raw.rfind('{'), raw.rfind('}')) else {
        return (raw, None);
    };
    if end < start {
        return (raw, None);
    }

    match serde_json::from_str::<VisualTags>(&raw[start..=end]) {
        Ok(tags) => (strip_trailing_fence(raw[..start].trim_end()), Some(tags)),
        Err(e) => {
            warn!("Visual tags block is not valid JSON, continuing without tags: {e}");
            (raw, None)
        }
    }
}

/// Models sometimes wrap the tag block in a ```json fence; drop the opening half.
fn strip_trailing_fence(text: &str) -> &str {
    let text = text.trim_end();
    text.strip_suffix("```json")
        .or_else(|| text.strip_suffix("```"))
        .map(str::trim_end)
        .unwrap_or(text)
}

/// Splits on `PAGE_MARKER`. Text before the first marker (titles, preambles)
/// is dropped; without any marker the whole body is one page.
pub fn split_pages(content: &str) -> Vec<String> {
    if !content.contains(PAGE_MARKER) {
        let single = join_lines(content);
        return if single.is_empty() {
            vec![]
        } else {
            vec![single]
        };
    }

    let mut segments = content.split(PAGE_MARKER);
    if let Some(preamble) = segments.next() {
        if !preamble.trim().is_empty() {
            debug!("Dropping {} chars before the first page marker", preamble.trim().chars().count());
        }
    }

    segments
        .map(join_lines)
        .filter(|page| !page.is_empty())
        .collect()
}

fn join_lines(segment: &str) -> String {
    segment
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::story::PLACEHOLDER_PAGE;

    const THREE_PAGE_STORY: &str = "《小兔子的月亮船》\n\
        【PAGE】[小兔子]坐在[草地]上，抬头看着[月亮]。\n\
        「月亮好亮呀！」小兔子说。\n\
        \n\
        【PAGE】[猫头鹰]飞来了，带着一艘[月亮船]。\n\
        【PAGE】他们一起飞向[星空]，「晚安！」\n\
        {\"colors\": [\"蓝色\", \"金色\"], \"objects\": [\"月亮船\", \"小兔子\"]}";

    #[test]
    fn test_parses_pages_and_tags() {
        let parsed = parse_story_text(THREE_PAGE_STORY, 3);
        assert_eq!(parsed.pages.len(), 3);
        assert_eq!(
            parsed.pages[0],
            "[小兔子]坐在[草地]上，抬头看着[月亮]。 「月亮好亮呀！」小兔子说。"
        );
        assert_eq!(parsed.pages[1], "[猫头鹰]飞来了，带着一艘[月亮船]。");
        assert_eq!(parsed.pages[2], "他们一起飞向[星空]，「晚安！」");

        let tags = parsed.visual_tags.unwrap();
        assert_eq!(tags.colors, vec!["蓝色", "金色"]);
        assert_eq!(tags.objects, vec!["月亮船", "小兔子"]);
    }

    #[test]
    fn test_title_before_first_marker_is_dropped() {
        let parsed = parse_story_text(THREE_PAGE_STORY, 3);
        assert!(parsed.pages.iter().all(|p| !p.contains("月亮船》")));
    }

    #[test]
    fn test_underflow_is_padded_with_placeholder() {
        let parsed = parse_story_text(THREE_PAGE_STORY, 5);
        assert_eq!(parsed.pages.len(), 5);
        assert_eq!(parsed.pages[3], PLACEHOLDER_PAGE);
        assert_eq!(parsed.pages[4], PLACEHOLDER_PAGE);
    }

    #[test]
    fn test_overflow_is_truncated_in_order() {
        let parsed = parse_story_text(THREE_PAGE_STORY, 2);
        assert_eq!(parsed.pages.len(), 2);
        assert!(parsed.pages[1].starts_with("[猫头鹰]"));
    }

    #[test]
    fn test_missing_marker_falls_back_to_single_page() {
        let parsed = parse_story_text("从前有一只小熊。\n它很爱吃蜂蜜。", 3);
        assert_eq!(parsed.pages[0], "从前有一只小熊。 它很爱吃蜂蜜。");
        assert_eq!(parsed.pages[1], PLACEHOLDER_PAGE);
        assert!(parsed.visual_tags.is_none());
    }

    #[test]
    fn test_invalid_tag_json_is_omitted_and_story_kept() {
        let raw = "【PAGE】小熊醒了。\n{\"colors\": [\"红色\",}";
        let parsed = parse_story_text(raw, 1);
        assert!(parsed.visual_tags.is_none());
        // the broken block stays in the text rather than failing the book
        assert!(parsed.pages[0].starts_with("小熊醒了。"));
    }

    #[test]
    fn test_fenced_tag_block_is_stripped() {
        let raw = "【PAGE】小熊醒了。\n```json\n{\"colors\": [\"红色\"], \"objects\": []}\n```";
        let (content, tags) = split_visual_tags(raw);
        assert_eq!(content, "【PAGE】小熊醒了。");
        assert_eq!(tags.unwrap().colors, vec!["红色"]);
    }

    #[test]
    fn test_empty_text_yields_only_placeholders() {
        let parsed = parse_story_text("", 2);
        assert_eq!(parsed.pages, vec![PLACEHOLDER_PAGE, PLACEHOLDER_PAGE]);
    }

    #[test]
    fn test_page_count_invariant_holds_for_any_n() {
        for n in 1..=12 {
            assert_eq!(parse_story_text(THREE_PAGE_STORY, n).pages.len(), n as usize);
        }
    }
}
