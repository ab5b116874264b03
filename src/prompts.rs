//! The per-page analysis prompt.
//!
//! Kept in one place so prompt wording can change without touching the
//! request or orchestration code, and so tests can inspect it directly.
//! The template is Chinese because the notes it produces are; the five
//! `###` sections come back verbatim as the interpretation's structure.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Section headings the model is asked to produce, in order.
pub const SECTIONS: [&str; 5] = ["概念解释", "技术挑战", "解决方案", "方案优势", "最佳实践"];

/// Template with `{topic}` and `{text}` placeholders.
pub const NOTE_PROMPT_TEMPLATE: &str = r#"作为一位专业的技术分析专家，请帮助我深入理解以下内容。

主题方向：{topic}

源内容：
{text}

请按照以下结构进行内容分析和总结， 需避免单纯的列表罗列：

### 概念解释
请提取并解释文中最关键的2-3个技术概念或术语，确保解释准确且易于理解。每个概念解释应包含：

### 技术挑战
分析文中描述的主要技术挑战，以及传统解决方案的局限性

### 解决方案
详细分析文中提出的解决方案：
- 核心技术架构
- 关键实现方法

### 方案优势
系统总结该方案的优势

### 最佳实践
总结相关领域的实践经验

要求：
- 分析要准确、客观，避免主观臆测
- 重点突出技术本质和创新点
- 保持专业性的同时确保表述清晰
- 适当补充相关领域的专业见解
- 每个部分都需要完整的语段阐述，而不是简单列举

请基于文本内容进行分析，如有不足之处，可以基于专业知识适当补充，但要明确区分原文信息和补充信息。
"#;

static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(topic|text)\}").unwrap());

/// Fill the template for one page. Deterministic: same inputs, same prompt.
///
/// Both placeholders are filled in one pass over the template, so braces in
/// the topic or the page text are never expanded.
pub fn build_prompt(text: &str, topic: &str) -> String {
    RE_PLACEHOLDER
        .replace_all(NOTE_PROMPT_TEMPLATE, |caps: &Captures| match &caps[1] {
            "topic" => topic.to_string(),
            _ => text.to_string(),
        })
        .into_owned()
}
