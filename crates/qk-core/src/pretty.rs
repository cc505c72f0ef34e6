use std::fmt::Write as _;

/// Configuration for rendering emitted sources.
#[derive(Debug, Clone)]
pub struct PrettyOptions {
    /// Number of spaces to indent per nesting level.
    pub indent_size: usize,
}

impl Default for PrettyOptions {
    fn default() -> Self {
        Self { indent_size: 4 }
    }
}

/// Line-oriented buffer with indentation tracking, shared by the text
/// backends.
pub struct SourceWriter {
    options: PrettyOptions,
    indent: usize,
    buf: String,
}

impl SourceWriter {
    pub fn new(options: PrettyOptions) -> Self {
        Self {
            options,
            indent: 0,
            buf: String::new(),
        }
    }

    pub fn with_indent_size(indent_size: usize) -> Self {
        Self::new(PrettyOptions { indent_size })
    }

    pub fn line(&mut self, line: impl AsRef<str>) -> &mut Self {
        let line = line.as_ref();
        if line.is_empty() {
            self.buf.push('\n');
        } else {
            let _ = writeln!(self.buf, "{:width$}{}", "", line, width = self.indent);
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        if !self.buf.is_empty() && !self.buf.ends_with("\n\n") {
            self.buf.push('\n');
        }
        self
    }

    pub fn current_indent(&self) -> usize {
        self.indent
    }

    pub fn increase_indent(&mut self) {
        self.indent += self.options.indent_size;
    }

    pub fn decrease_indent(&mut self) {
        self.indent = self.indent.saturating_sub(self.options.indent_size);
    }

    pub fn with_indent<F>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        self.increase_indent();
        f(self);
        self.decrease_indent();
        self
    }

    /// `open` line, indented body, `close` line.
    pub fn block<F>(&mut self, open: impl AsRef<str>, close: impl AsRef<str>, f: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        self.line(open);
        self.with_indent(f);
        self.line(close)
    }

    pub fn finish(mut self) -> String {
        while self.buf.ends_with("\n\n") {
            self.buf.pop();
        }
        if !self.buf.is_empty() && !self.buf.ends_with('\n') {
            self.buf.push('\n');
        }
        self.buf
    }
}

/// Double-quoted string literal escaping shared by the C-family targets.
pub fn escape_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch.is_control() => {
                let _ = write!(out, "\\u{:04x}", ch as u32);
            }
            _ => out.push(ch),
        }
    }
    out
}

pub fn quote(input: &str) -> String {
    format!("\"{}\"", escape_string(input))
}
