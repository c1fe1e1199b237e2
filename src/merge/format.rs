use owo_colors::OwoColorize;

use crate::config::HumanFormat;
use crate::types::LogLine;

const LABEL_COL_WIDTH: usize = 36;

pub struct LineFormatter {
    human: HumanFormat,
}

impl LineFormatter {
    pub fn new(human: HumanFormat) -> Self {
        Self { human }
    }

    pub fn format_human(&self, line: &LogLine) -> String {
        let label_plain = format!("{}/{}", line.pod, line.container);
        let label_padded = pad_label(&label_plain, LABEL_COL_WIDTH);

        let label_final = if self.human.color {
            label_padded.color(line.color).to_string()
        } else {
            label_padded
        };

        format!("{label_final} │ {}", line.message)
    }
}

fn pad_label(s: &str, width: usize) -> String {
    if s.len() >= width {
        s.to_string()
    } else {
        format!("{s:<width$}", width = width)
    }
}
