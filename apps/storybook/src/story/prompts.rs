/// Marker the story model is asked to put at the start of every page.
pub const PAGE_MARKER: &str = "【PAGE】";

pub const STORY_PROMPT_TEMPLATE: &str = r#"
创作主题：{theme}
风格要求：{style}风格
字数限制：{min_chars}-{max_chars}字
格式要求：
1. 明确分为{page_count}个段落，每段以【PAGE】标记开头
2. 每段包含3-5个可视化元素（用[]标记，如[彩虹滑梯]）
3. 包含简单对话（用「」标记）
4. 最后追加JSON格式的可视化标签：
{"colors": ["主色1", "主色2"], "objects": ["关键物体1", "关键物体2"]}
"#;

/// Fills the story template. Length targets scale with the page count.
pub fn build_story_prompt(theme: &str, style: &str, page_count: u32) -> String {
    STORY_PROMPT_TEMPLATE
        .replace("{theme}", theme)
        .replace("{style}", style)
        .replace("{min_chars}", &(u64::from(page_count) * 80).to_string())
        .replace("{max_chars}", &(u64::from(page_count) * 120).to_string())
        .replace("{page_count}", &page_count.to_string())
}
