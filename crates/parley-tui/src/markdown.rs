//! Message content renderers
//!
//! Assistant replies go through a markdown pipeline; user text is shown as
//! typed. Both produce lines already wrapped to the target width so the chat
//! view can compute scroll offsets exactly.

use parley_core::Sender;
use pulldown_cmark::{Alignment, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub trait MessageRenderer {
    fn render(&self, text: &str, width: usize) -> Vec<Line<'static>>;
}

/// Renders text verbatim, one wrapped paragraph per input line
pub struct PlainText;

/// Renders CommonMark with tables, strikethrough, and task lists
pub struct Markdown;

pub fn renderer_for(sender: Sender) -> &'static dyn MessageRenderer {
    match sender {
        Sender::User => &PlainText,
        Sender::Bot => &Markdown,
    }
}

impl MessageRenderer for PlainText {
    fn render(&self, text: &str, width: usize) -> Vec<Line<'static>> {
        text.lines()
            .flat_map(|line| wrap_spans(vec![Span::raw(line.to_string())], width, &[], &[]))
            .collect()
    }
}

impl MessageRenderer for Markdown {
    fn render(&self, text: &str, width: usize) -> Vec<Line<'static>> {
        let mut writer = MarkdownWriter::new(width);
        for event in Parser::new_ext(text, markdown_options()) {
            writer.handle(event);
        }
        writer.finish()
    }
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

/// Every link destination in `text`, in document order, without duplicates.
pub fn links(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for event in Parser::new_ext(text, markdown_options()) {
        if let Event::Start(Tag::Link { dest_url, .. }) = event {
            let url = dest_url.into_string();
            if !found.contains(&url) {
                found.push(url);
            }
        }
    }
    found
}

/// Display width in terminal columns; wide CJK and emoji count as two.
pub fn text_width(text: &str) -> usize {
    UnicodeWidthStr::width(text)
}

/// Splits `text` after at most `columns` display columns. The head always
/// holds at least one char, even one wider than `columns`.
pub fn split_at_width(text: &str, columns: usize) -> (&str, &str) {
    let mut used = 0;
    for (idx, c) in text.char_indices() {
        let w = c.width().unwrap_or(0);
        if idx > 0 && used + w > columns {
            return text.split_at(idx);
        }
        used += w;
    }
    (text, "")
}

/// The part of `text` between display columns `skip` and `skip + take`.
/// Wide chars straddling either edge are dropped.
pub fn slice_columns(text: &str, skip: usize, take: usize) -> String {
    let mut col = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if col >= skip && col + w <= skip + take {
            out.push(c);
        }
        col += w;
        if col >= skip + take {
            break;
        }
    }
    out
}

fn spans_width(spans: &[Span<'_>]) -> usize {
    spans.iter().map(|s| text_width(&s.content)).sum()
}

/// Greedy word wrap over styled spans. `first_prefix` starts the first line,
/// `rest_prefix` every continuation line. Words longer than a line are split.
pub fn wrap_spans(
    spans: Vec<Span<'static>>,
    width: usize,
    first_prefix: &[Span<'static>],
    rest_prefix: &[Span<'static>],
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = first_prefix.to_vec();
    let mut avail = width.saturating_sub(spans_width(first_prefix)).max(1);
    let mut used = 0;

    let rest_avail = width.saturating_sub(spans_width(rest_prefix)).max(1);

    for span in spans {
        let style = span.style;
        for token in span.content.split_inclusive(' ') {
            let visible = text_width(token.trim_end_matches(' '));
            if used > 0 && used + visible > avail {
                lines.push(end_line(std::mem::replace(&mut current, rest_prefix.to_vec())));
                avail = rest_avail;
                used = 0;
            }

            let mut piece: String = if used == 0 {
                token.trim_start_matches(' ').to_string()
            } else {
                token.to_string()
            };

            // Hard-split words that can't fit on an empty line
            while used == 0 && text_width(piece.trim_end_matches(' ')) > avail {
                let (head, tail) = split_at_width(&piece, avail);
                let (head, tail) = (head.to_string(), tail.to_string());
                piece = tail;
                current.push(Span::styled(head, style));
                lines.push(end_line(std::mem::replace(&mut current, rest_prefix.to_vec())));
                avail = rest_avail;
            }

            if !piece.is_empty() {
                used += text_width(&piece);
                current.push(Span::styled(piece, style));
            }
        }
    }

    if used > 0 || lines.is_empty() {
        lines.push(end_line(current));
    }

    lines
}

fn end_line(mut spans: Vec<Span<'static>>) -> Line<'static> {
    if let Some(last) = spans.last_mut() {
        let trimmed = last.content.trim_end_matches(' ');
        if trimmed.len() != last.content.len() {
            last.content = trimmed.to_string().into();
        }
    }
    Line::from(spans)
}

#[derive(Default)]
struct TableBuf {
    alignments: Vec<Alignment>,
    header: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

struct MarkdownWriter {
    width: usize,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    quote_depth: usize,
    // One entry per open list: next number for ordered lists
    lists: Vec<Option<u64>>,
    item_marker: Option<String>,
    code_block: Option<String>,
    code_lang: String,
    link: Option<(String, usize)>,
    table: Option<TableBuf>,
}

impl MarkdownWriter {
    fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
            lines: Vec::new(),
            spans: Vec::new(),
            styles: Vec::new(),
            quote_depth: 0,
            lists: Vec::new(),
            item_marker: None,
            code_block: None,
            code_lang: String::new(),
            link: None,
            table: None,
        }
    }

    fn style(&self) -> Style {
        self.styles
            .iter()
            .fold(Style::default(), |acc, style| acc.patch(*style))
    }

    fn quote_prefix(&self) -> Vec<Span<'static>> {
        (0..self.quote_depth)
            .map(|_| Span::styled("│ ", Style::default().fg(Color::DarkGray)))
            .collect()
    }

    /// Prefixes for the first and following lines of the current block
    fn prefixes(&mut self) -> (Vec<Span<'static>>, Vec<Span<'static>>) {
        let base = self.quote_prefix();
        if self.lists.is_empty() {
            return (base.clone(), base);
        }

        let indent = "  ".repeat(self.lists.len() - 1);
        let mut first = base.clone();
        let mut rest = base;
        match self.item_marker.take() {
            Some(marker) => {
                rest.push(Span::raw(format!("{}{}", indent, " ".repeat(text_width(&marker)))));
                first.push(Span::raw(indent));
                first.push(Span::styled(marker, Style::default().fg(Color::Cyan)));
            }
            None => {
                let pad = format!("{}  ", indent);
                first.push(Span::raw(pad.clone()));
                rest.push(Span::raw(pad));
            }
        }
        (first, rest)
    }

    fn flush(&mut self) {
        if self.spans.is_empty() && self.item_marker.is_none() {
            return;
        }
        let spans = std::mem::take(&mut self.spans);
        let (first, rest) = self.prefixes();
        let wrapped = wrap_spans(spans, self.width, &first, &rest);
        self.lines.extend(wrapped);
    }

    /// Blank separator between blocks, never at the very top
    fn gap(&mut self) {
        if self.lines.last().is_some_and(|l| spans_width(&l.spans) > spans_width(&self.quote_prefix())) {
            self.lines.push(Line::from(self.quote_prefix()));
        }
    }

    fn push_text(&mut self, text: &str, style: Style) {
        if let Some(code) = self.code_block.as_mut() {
            code.push_str(text);
        } else if let Some(table) = self.table.as_mut() {
            table.cell.push_str(text);
        } else {
            self.spans.push(Span::styled(text.to_string(), style));
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                let style = self.style();
                self.push_text(&text, style);
            }
            Event::Code(code) => {
                let style = self.style().patch(inline_code_style());
                self.push_text(&code, style);
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                let style = self.style();
                self.push_text(html.trim_end_matches('\n'), style);
            }
            Event::SoftBreak => {
                let style = self.style();
                self.push_text(" ", style);
            }
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.gap();
                let mut rule = self.quote_prefix();
                rule.push(Span::styled(
                    "─".repeat(self.width.min(40)),
                    Style::default().fg(Color::DarkGray),
                ));
                self.lines.push(Line::from(rule));
            }
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                self.push_text(marker, Style::default().fg(Color::Cyan));
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.item_marker.is_none() {
                    self.flush();
                    self.gap();
                }
            }
            Tag::Heading { level, .. } => {
                self.flush();
                self.gap();
                self.styles.push(heading_style(level));
            }
            Tag::BlockQuote { .. } => {
                self.flush();
                self.gap();
                self.quote_depth += 1;
                self.styles
                    .push(Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC));
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                self.gap();
                self.code_lang = match kind {
                    CodeBlockKind::Fenced(lang) => lang.into_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code_block = Some(String::new());
            }
            Tag::List(start) => {
                self.flush();
                if self.lists.is_empty() {
                    self.gap();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.item_marker = Some(marker);
            }
            Tag::Emphasis => self.styles.push(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.styles.push(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self
                .styles
                .push(Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { dest_url, .. } => {
                self.link = Some((dest_url.into_string(), self.spans.len()));
                self.styles.push(link_style());
            }
            Tag::Table(alignments) => {
                self.flush();
                self.gap();
                self.table = Some(TableBuf {
                    alignments,
                    ..TableBuf::default()
                });
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.clear();
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.flush(),
            TagEnd::Heading(_) => {
                self.flush();
                self.styles.pop();
            }
            TagEnd::BlockQuote { .. } => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.styles.pop();
            }
            TagEnd::CodeBlock => self.finish_code_block(),
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
            }
            TagEnd::Item => self.flush(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.styles.pop();
            }
            TagEnd::Link => {
                self.styles.pop();
                if let Some((url, start)) = self.link.take() {
                    let label: String = self
                        .spans
                        .get(start..)
                        .unwrap_or_default()
                        .iter()
                        .map(|s| s.content.as_ref())
                        .collect();
                    if label != url && self.table.is_none() {
                        self.spans.push(Span::styled(
                            format!(" ({})", url),
                            Style::default().fg(Color::DarkGray),
                        ));
                    }
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.header = Some(std::mem::take(&mut table.row));
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell.trim().to_string());
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    let prefix = self.quote_prefix();
                    self.lines.extend(render_table(&table, self.width, &prefix));
                }
            }
            _ => {}
        }
    }

    fn finish_code_block(&mut self) {
        let Some(code) = self.code_block.take() else {
            return;
        };
        let prefix = self.quote_prefix();
        let lang = std::mem::take(&mut self.code_lang);

        if !lang.is_empty() {
            let mut header = prefix.clone();
            header.push(Span::styled(
                format!(" {} ", lang),
                Style::default().fg(Color::Black).bg(Color::DarkGray),
            ));
            self.lines.push(Line::from(header));
        }

        let style = code_block_style();
        let avail = self.width.saturating_sub(spans_width(&prefix) + 2).max(1);
        for line in code.trim_end_matches('\n').split('\n') {
            let mut chunks: Vec<String> = Vec::new();
            let mut rest = line;
            loop {
                let (chunk, tail) = split_at_width(rest, avail);
                chunks.push(chunk.to_string());
                if tail.is_empty() {
                    break;
                }
                rest = tail;
            }
            for chunk in chunks {
                let mut spans = prefix.clone();
                spans.push(Span::styled("▏ ", Style::default().fg(Color::DarkGray)));
                spans.push(Span::styled(chunk, style));
                self.lines.push(Line::from(spans));
            }
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|l| spans_width(&l.spans) == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

fn heading_style(level: HeadingLevel) -> Style {
    let style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    match level {
        HeadingLevel::H1 => style.add_modifier(Modifier::UNDERLINED),
        HeadingLevel::H2 => style,
        _ => Style::default().add_modifier(Modifier::BOLD),
    }
}

fn link_style() -> Style {
    Style::default()
        .fg(Color::Blue)
        .add_modifier(Modifier::UNDERLINED)
}

fn inline_code_style() -> Style {
    Style::default().fg(Color::Yellow)
}

fn code_block_style() -> Style {
    Style::default().fg(Color::Green)
}

fn pad_cell(text: &str, width: usize, alignment: Alignment) -> String {
    let len = text_width(text);
    let text: String = if len > width {
        let mut cut = split_at_width(text, width.saturating_sub(1)).0.to_string();
        cut.push('…');
        cut
    } else {
        text.to_string()
    };
    let space = width.saturating_sub(text_width(&text));
    match alignment {
        Alignment::Right => format!("{}{}", " ".repeat(space), text),
        Alignment::Center => {
            let left = space / 2;
            format!("{}{}{}", " ".repeat(left), text, " ".repeat(space - left))
        }
        _ => format!("{}{}", text, " ".repeat(space)),
    }
}

fn render_table(table: &TableBuf, width: usize, prefix: &[Span<'static>]) -> Vec<Line<'static>> {
    let all_rows: Vec<&Vec<String>> = table.header.iter().chain(table.rows.iter()).collect();
    let columns = all_rows.iter().map(|r| r.len()).max().unwrap_or(0);
    if columns == 0 {
        return Vec::new();
    }

    let mut widths: Vec<usize> = (0..columns)
        .map(|col| {
            all_rows
                .iter()
                .filter_map(|row| row.get(col))
                .map(|cell| text_width(cell))
                .max()
                .unwrap_or(0)
                .max(3)
        })
        .collect();

    // Borders and padding take 3 columns per cell plus one
    let chrome = columns * 3 + 1 + spans_width(prefix);
    let avail = width.saturating_sub(chrome);
    if widths.iter().sum::<usize>() > avail {
        let cap = (avail / columns).max(3);
        for w in widths.iter_mut() {
            *w = (*w).min(cap);
        }
    }

    let border = Style::default().fg(Color::DarkGray);
    let rule = |left: &str, mid: &str, right: &str| {
        let body = widths
            .iter()
            .map(|w| "─".repeat(w + 2))
            .collect::<Vec<_>>()
            .join(mid);
        let mut spans = prefix.to_vec();
        spans.push(Span::styled(format!("{}{}{}", left, body, right), border));
        Line::from(spans)
    };
    let row_line = |row: &Vec<String>, style: Style| {
        let mut spans = prefix.to_vec();
        spans.push(Span::styled("│", border));
        for (col, w) in widths.iter().enumerate() {
            let cell = row.get(col).map(String::as_str).unwrap_or("");
            let alignment = table.alignments.get(col).copied().unwrap_or(Alignment::None);
            spans.push(Span::styled(format!(" {} ", pad_cell(cell, *w, alignment)), style));
            spans.push(Span::styled("│", border));
        }
        Line::from(spans)
    };

    let mut lines = vec![rule("┌", "┬", "┐")];
    if let Some(header) = &table.header {
        lines.push(row_line(header, Style::default().add_modifier(Modifier::BOLD)));
        lines.push(rule("├", "┼", "┤"));
    }
    for row in &table.rows {
        lines.push(row_line(row, Style::default()));
    }
    lines.push(rule("└", "┴", "┘"));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn has_modifier(lines: &[Line<'_>], text: &str, modifier: Modifier) -> bool {
        lines
            .iter()
            .flat_map(|l| l.spans.iter())
            .any(|s| s.content.contains(text) && s.style.add_modifier.contains(modifier))
    }

    #[test]
    fn test_wrap_spans_breaks_on_words() {
        let lines = wrap_spans(vec![Span::raw("the quick brown fox")], 10, &[], &[]);
        assert_eq!(plain(&lines), vec!["the quick", "brown fox"]);
    }

    #[test]
    fn test_wrap_spans_splits_long_words() {
        let lines = wrap_spans(vec![Span::raw("abcdefghij")], 4, &[], &[]);
        assert_eq!(plain(&lines), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_wrap_spans_uses_prefixes() {
        let first = [Span::raw("• ")];
        let rest = [Span::raw("  ")];
        let lines = wrap_spans(vec![Span::raw("one two three")], 9, &first, &rest);
        assert_eq!(plain(&lines), vec!["• one two", "  three"]);
    }

    #[test]
    fn test_wide_chars_wrap_by_columns() {
        let text = "你好世界你好世界你好世界 ✅✅✅✅✅✅✅✅";
        for lines in [Markdown.render(text, 10), PlainText.render(text, 10)] {
            assert!(lines.iter().all(|l| l.width() <= 10), "{:?}", plain(&lines));
            assert_eq!(plain(&lines).concat().replace(' ', ""), text.replace(' ', ""));
        }
    }

    #[test]
    fn test_wide_code_and_table_fit_width() {
        let lines = Markdown.render("```\n日本語のコードブロックです\n```", 12);
        assert!(lines.iter().all(|l| l.width() <= 12), "{:?}", plain(&lines));

        let table = "| 名前 | 説明 |\n|---|---|\n| 東京 | とても長い説明の文章です |";
        let lines = Markdown.render(table, 20);
        assert!(lines.iter().all(|l| l.width() <= 20), "{:?}", plain(&lines));
    }

    #[test]
    fn test_slice_columns_drops_split_wide_chars() {
        assert_eq!(split_at_width("a你好", 2), ("a", "你好"));
        assert_eq!(slice_columns("你好ab", 1, 4), "好a");
        assert_eq!(slice_columns("hello", 1, 3), "ell");
    }

    #[test]
    fn test_plain_text_keeps_markdown_literal() {
        let lines = PlainText.render("**not bold**\n# not heading", 80);
        assert_eq!(plain(&lines), vec!["**not bold**", "# not heading"]);
        assert!(lines.iter().flat_map(|l| l.spans.iter()).all(|s| s.style == Style::default()));
    }

    #[test]
    fn test_heading_and_emphasis() {
        let lines = Markdown.render("# Title\n\nSome **bold** and *soft* text", 80);
        let text = plain(&lines);
        assert_eq!(text[0], "Title");
        assert_eq!(text[1], "");
        assert_eq!(text[2], "Some bold and soft text");
        assert!(has_modifier(&lines, "Title", Modifier::UNDERLINED));
        assert!(has_modifier(&lines, "bold", Modifier::BOLD));
        assert!(has_modifier(&lines, "soft", Modifier::ITALIC));
    }

    #[test]
    fn test_lists() {
        let lines = Markdown.render("- apple\n- pear\n  - nested\n\n1. first\n2. second", 80);
        let text = plain(&lines);
        assert!(text.contains(&"• apple".to_string()));
        assert!(text.contains(&"• pear".to_string()));
        assert!(text.contains(&"  • nested".to_string()));
        assert!(text.contains(&"1. first".to_string()));
        assert!(text.contains(&"2. second".to_string()));
    }

    #[test]
    fn test_ordered_list_respects_start() {
        let text = plain(&Markdown.render("3. three\n4. four", 80));
        assert_eq!(text, vec!["3. three", "4. four"]);
    }

    #[test]
    fn test_block_quote_prefix() {
        let text = plain(&Markdown.render("> quoted words", 80));
        assert_eq!(text, vec!["│ quoted words"]);
    }

    #[test]
    fn test_fenced_code_block() {
        let lines = Markdown.render("```rust\nfn main() {}\n    indented\n```", 80);
        let text = plain(&lines);
        assert_eq!(text, vec![" rust ", "▏ fn main() {}", "▏     indented"]);
    }

    #[test]
    fn test_inline_code_is_styled() {
        let lines = Markdown.render("run `cargo` now", 80);
        assert_eq!(plain(&lines), vec!["run cargo now"]);
        let code = lines[0].spans.iter().find(|s| s.content == "cargo").unwrap();
        assert_eq!(code.style.fg, Some(Color::Yellow));
    }

    #[test]
    fn test_link_shows_destination() {
        let lines = Markdown.render("see [the docs](https://example.com/docs)", 80);
        assert_eq!(plain(&lines), vec!["see the docs (https://example.com/docs)"]);
        assert!(has_modifier(&lines, "the", Modifier::UNDERLINED));
    }

    #[test]
    fn test_autolink_not_repeated() {
        let text = plain(&Markdown.render("<https://example.com>", 80));
        assert_eq!(text, vec!["https://example.com"]);
    }

    #[test]
    fn test_links_collects_unique_destinations() {
        let found = links("[a](https://a.test) [b](https://b.test) [again](https://a.test)");
        assert_eq!(found, vec!["https://a.test", "https://b.test"]);
        assert!(links("no links here").is_empty());
    }

    #[test]
    fn test_table() {
        let text = plain(&Markdown.render("| Name | Qty |\n|------|----:|\n| tea | 2 |", 80));
        assert_eq!(
            text,
            vec![
                "┌──────┬─────┐",
                "│ Name │ Qty │",
                "├──────┼─────┤",
                "│ tea  │   2 │",
                "└──────┴─────┘",
            ]
        );
    }

    #[test]
    fn test_renderer_dispatch_by_sender() {
        let bot = renderer_for(Sender::Bot).render("**hi**", 80);
        let user = renderer_for(Sender::User).render("**hi**", 80);
        assert_eq!(plain(&bot), vec!["hi"]);
        assert_eq!(plain(&user), vec!["**hi**"]);
    }
}
