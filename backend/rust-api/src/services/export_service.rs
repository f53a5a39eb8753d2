use chrono::NaiveDate;
use printpdf::{
    BuiltinFont, Color, Greyscale, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, Point, Pt, Rgb,
    TextItem,
};
use serde::Deserialize;
use std::str::FromStr;

use crate::metrics::EXPORTS_GENERATED_TOTAL;
use crate::models::result::QuizResult;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_LEFT_MM: f32 = 20.0;
const TOP_MM: f32 = 277.0;
const BOTTOM_MM: f32 = 20.0;
const LINE_STEP_MM: f32 = 5.5;
const WRAP_COLUMNS: usize = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[serde(alias = "text")]
    Txt,
    Pdf,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "text/plain; charset=utf-8",
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "txt" | "text" => Ok(ExportFormat::Txt),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(format!("Unsupported export format: {}", other)),
        }
    }
}

/// `quiz-results-2024-05-01.txt`
pub fn file_name(format: ExportFormat, date: NaiveDate) -> String {
    format!("quiz-results-{}.{}", date.format("%Y-%m-%d"), format.extension())
}

pub fn render(result: &QuizResult, format: ExportFormat) -> Vec<u8> {
    EXPORTS_GENERATED_TOTAL
        .with_label_values(&[format.extension()])
        .inc();
    match format {
        ExportFormat::Txt => render_text(result).into_bytes(),
        ExportFormat::Pdf => render_pdf(result),
    }
}

fn option_letter(index: usize) -> char {
    (b'A' + index as u8) as char
}

/// Plain-text report: score header, then every question with lettered
/// options, the correct and given answers and, if enabled, the explanation.
pub fn render_text(result: &QuizResult) -> String {
    let mut out = String::new();
    out.push_str("QUIZ RESULTS\n============\n\n");
    out.push_str(&format!(
        "Score: {}/{} ({}%)\n{}\n\n",
        result.score,
        result.total_questions,
        result.percentage(),
        result.score_message()
    ));
    out.push_str("QUESTIONS AND ANSWERS\n=====================\n");

    let blocks: Vec<String> = result
        .questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let answer = result.answers.get(index).copied().flatten();
            let mut block = format!("\nQuestion {}: {}\n\nOptions:\n", index + 1, question.question);
            for (i, option) in question.options.iter().enumerate() {
                block.push_str(&format!("{}. {}\n", option_letter(i), option));
            }
            block.push_str(&format!(
                "\nCorrect Answer: {}\n",
                option_letter(question.correct_answer)
            ));
            block.push_str(&format!(
                "Your Answer: {}\n",
                answer
                    .map(|a| option_letter(a).to_string())
                    .unwrap_or_else(|| "No answer".to_string())
            ));
            block.push_str(&format!(
                "Result: {}\n",
                if question.is_correct(answer) {
                    "Correct"
                } else {
                    "Incorrect"
                }
            ));
            if result.settings.show_explanations {
                if let Some(explanation) = &question.explanation {
                    block.push_str(&format!("\nExplanation: {}\n", explanation));
                }
            }
            block
        })
        .collect();

    out.push_str(&blocks.join("\n---\n"));
    out
}

/// Greedy word wrap on character counts.
fn wrap(line: &str, width: usize) -> Vec<String> {
    if line.chars().count() <= width {
        return vec![line.to_string()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let needed = current.chars().count() + word.chars().count() + usize::from(!current.is_empty());
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn push_pdf_text(
    ops: &mut Vec<Op>,
    pos: Point,
    font: BuiltinFont,
    font_size: f32,
    text: String,
    color: &Color,
) {
    ops.extend([
        Op::StartTextSection,
        Op::SetTextCursor { pos },
        Op::SetFontSizeBuiltinFont {
            size: Pt(font_size),
            font,
        },
        Op::SetLineHeight {
            lh: Pt(font_size * 1.3),
        },
        Op::SetFillColor { col: color.clone() },
        Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(text)],
            font,
        },
        Op::EndTextSection,
    ]);
}

/// Same report as [`render_text`], laid out on as many A4 pages as needed.
pub fn render_pdf(result: &QuizResult) -> Vec<u8> {
    let mut document = PdfDocument::new("Quiz Results");
    let accent_color = Color::Rgb(Rgb {
        r: 0.16,
        g: 0.4,
        b: 0.69,
        icc_profile: None,
    });
    let text_color = Color::Greyscale(Greyscale::new(0.08, None));

    let mut pages = Vec::new();
    let mut ops = Vec::new();
    let mut y = TOP_MM;

    push_pdf_text(
        &mut ops,
        Point::new(Mm(MARGIN_LEFT_MM), Mm(y)),
        BuiltinFont::HelveticaBold,
        18.0,
        "Quiz Results".into(),
        &accent_color,
    );
    y -= LINE_STEP_MM * 2.0;

    let text = render_text(result);
    // the first two lines are the plain-text title and its underline
    for raw_line in text.lines().skip(2) {
        if raw_line.chars().all(|c| c == '=') && !raw_line.is_empty() {
            continue;
        }
        let heading = raw_line.starts_with("Question ")
            || raw_line.starts_with("Score:")
            || raw_line == "QUESTIONS AND ANSWERS";
        let font = if heading {
            BuiltinFont::HelveticaBold
        } else {
            BuiltinFont::Helvetica
        };

        for line in wrap(raw_line, WRAP_COLUMNS) {
            if y < BOTTOM_MM {
                pages.push(PdfPage::new(
                    Mm(PAGE_WIDTH_MM),
                    Mm(PAGE_HEIGHT_MM),
                    std::mem::take(&mut ops),
                ));
                y = TOP_MM;
            }
            if !line.is_empty() {
                push_pdf_text(
                    &mut ops,
                    Point::new(Mm(MARGIN_LEFT_MM), Mm(y)),
                    font,
                    10.5,
                    line,
                    &text_color,
                );
            }
            y -= LINE_STEP_MM;
        }
    }
    pages.push(PdfPage::new(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), ops));

    let mut warnings = Vec::new();
    document
        .with_pages(pages)
        .save(&PdfSaveOptions::default(), &mut warnings)
}
