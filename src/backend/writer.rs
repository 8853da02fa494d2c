/// Accumulates generated source one line at a time, tracking indentation.
pub(crate) struct SourceWriter {
    output: String,
    depth: usize,
    unit: &'static str,
}

impl SourceWriter {
    pub fn new(unit: &'static str) -> Self {
        Self {
            output: String::new(),
            depth: 0,
            unit,
        }
    }

    /// Writes one line at the current depth. Embedded newlines are indented too.
    pub fn line(&mut self, text: impl AsRef<str>) {
        for line in text.as_ref().split('\n') {
            if line.is_empty() {
                self.output.push('\n');
                continue;
            }
            for _ in 0..self.depth {
                self.output.push_str(self.unit);
            }
            self.output.push_str(line);
            self.output.push('\n');
        }
    }

    pub fn blank(&mut self) {
        if !self.output.is_empty() && !self.output.ends_with("\n\n") {
            self.output.push('\n');
        }
    }

    /// Writes `header` and indents what follows.
    pub fn open(&mut self, header: impl AsRef<str>) {
        self.line(header);
        self.depth += 1;
    }

    /// Dedents and writes `footer`.
    pub fn close(&mut self, footer: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(footer);
    }

    /// Dedents, writes `text`, and indents again (`} else {`).
    pub fn reopen(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
        self.depth += 1;
    }

    /// Writes a block of verbatim text, stripping the block's common indent.
    pub fn verbatim(&mut self, text: &str) {
        let indent = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.len() - l.trim_start().len())
            .min()
            .unwrap_or(0);
        for line in text.trim_end().trim_start_matches('\n').lines() {
            self.line(line.get(indent..).unwrap_or("").trim_end());
        }
    }

    pub fn finish(mut self) -> String {
        while self.output.ends_with("\n\n") {
            self.output.pop();
        }
        self.output
    }
}
