//! 段落切分模块
//!
//! 把一段正文按句子分隔符切开，再按固定句数分组，每组作为一个翻译单元。

use std::num::NonZeroUsize;

/// 句子分隔符（句点加空格）
///
/// 这是启发式切分，缩写、小数等会被误切，保留它是为了与既有输出保持一致。
pub const SENTENCE_DELIMITER: &str = ". ";

/// 把文本切分为句数不超过 `sentences_per_group` 的段落块
///
/// 除最后一块外，每块重新用分隔符连接后补回被切掉的句点；最后一块不补，
/// 原文末尾的标点本就保留在最后一个句子里。去掉首尾空白后为空的文本返回空列表。
///
/// # 示例
///
/// ```rust
/// use std::num::NonZeroUsize;
/// use bilingual_epub::bilingual::segment;
///
/// let chunks = segment("A. B. C. D.", NonZeroUsize::new(2).unwrap());
/// assert_eq!(chunks, vec!["A. B.", "C. D."]);
/// ```
pub fn segment(text: &str, sentences_per_group: NonZeroUsize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let sentences: Vec<&str> = text.split(SENTENCE_DELIMITER).collect();
    let groups: Vec<&[&str]> = sentences.chunks(sentences_per_group.get()).collect();
    let last = groups.len() - 1;

    groups
        .iter()
        .enumerate()
        .map(|(index, group)| {
            let joined = group.join(SENTENCE_DELIMITER);
            if index < last {
                format!("{}.", joined)
            } else {
                joined
            }
        })
        .collect()
}
