//! 継続行の折り畳み

/// インデントされた継続行を直前の論理行へ連結する
///
/// 3文字以上の空白で始まる行は継続行として扱い、空白1つで連結します。
/// 空の論理行は捨てます。
pub fn fold_continuations(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.starts_with("   ") && !current.is_empty() {
            current.push(' ');
            current.push_str(line.trim());
            continue;
        }
        if !current.trim().is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        current = line.trim_end().to_string();
    }
    if !current.trim().is_empty() {
        lines.push(current);
    }

    lines
}
