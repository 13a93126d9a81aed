//! Turns one page of story text into an image prompt and overlay text.

use crate::layout::overlay::TextOverlay;
use crate::models::story::VisualTags;

/// Every `「…」` quotation, trimmed, joined by a space. `None` when the page has none.
pub fn extract_dialogue(page_text: &str) -> Option<String> {
    let quotes = delimited(page_text, '「', '」');
    if quotes.is_empty() {
        None
    } else {
        Some(quotes.join(" "))
    }
}

/// The `[element]` markers the story model was asked to embed in each paragraph.
pub fn extract_visual_elements(page_text: &str) -> Vec<String> {
    delimited(page_text, '[', ']')
}

/// `{style}风格，{elements joined by '，'}，主色调：{colors joined by ','}`
pub fn build_image_prompt(page_text: &str, style: &str, tags: &VisualTags) -> String {
    let elements = extract_visual_elements(page_text);
    format!(
        "{style}风格，{}，主色调：{}",
        elements.join("，"),
        tags.colors.join(",")
    )
}

pub fn overlay_for(page_text: &str) -> Option<TextOverlay> {
    extract_dialogue(page_text).map(TextOverlay::bottom)
}

/// Non-empty trimmed contents between `open` and the next `close`.
/// An unclosed `open` ends the scan.
fn delimited(text: &str, open: char, close: char) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        let after = &rest[start + open.len_utf8()..];
        let Some(end) = after.find(close) else {
            break;
        };
        let inner = after[..end].trim();
        if !inner.is_empty() {
            found.push(inner.to_string());
        }
        rest = &after[end + close.len_utf8()..];
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_quotation_is_extracted() {
        assert_eq!(extract_dialogue("这是「你好」的一天"), Some("你好".to_string()));
    }

    #[test]
    fn test_multiple_quotations_are_trimmed_and_joined() {
        let text = "小熊说：「 我们去找蜂蜜吧！ 」小兔回答：「好呀」";
        assert_eq!(
            extract_dialogue(text),
            Some("我们去找蜂蜜吧！ 好呀".to_string())
        );
    }

    #[test]
    fn test_no_dialogue_is_none() {
        assert_eq!(extract_dialogue("森林里很安静。"), None);
        assert_eq!(extract_dialogue("「」"), None);
        assert_eq!(extract_dialogue("只有开头「没有结尾"), None);
    }

    #[test]
    fn test_visual_elements_are_found_without_spaces() {
        let text = "[彩虹滑梯]旁边有一只[小松鼠]，它抱着[大松果]。";
        assert_eq!(
            extract_visual_elements(text),
            vec!["彩虹滑梯", "小松鼠", "大松果"]
        );
    }

    #[test]
    fn test_image_prompt_format() {
        let tags = VisualTags {
            colors: vec!["蓝色".to_string(), "金色".to_string()],
            objects: vec!["潜水艇".to_string()],
        };
        let prompt = build_image_prompt("[潜水艇]穿过[珊瑚礁]", "水彩", &tags);
        assert_eq!(prompt, "水彩风格，潜水艇，珊瑚礁，主色调：蓝色,金色");
    }

    #[test]
    fn test_image_prompt_with_no_elements_or_colors() {
        let prompt = build_image_prompt("平静的一天", "卡通", &VisualTags::default());
        assert_eq!(prompt, "卡通风格，，主色调：");
    }

    #[test]
    fn test_overlay_for_uses_bottom_position() {
        let overlay = overlay_for("「出发！」").unwrap();
        assert_eq!(overlay, TextOverlay::bottom("出发！"));
        assert!(overlay_for("没有对话").is_none());
    }
}
