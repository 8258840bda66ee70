//! crates/script_engine_core/src/export.rs
//!
//! Renders a document for use outside the editor: as JSON, or as a single
//! self-contained HTML page that also serves as the printable version.

use regex::Regex;
use std::fmt::Write as _;

use crate::domain::{Block, BlockBody, BlockKind, DisplayMedia, Document, Language, Tooltip};

/// The document exactly as modeled, pretty printed, with no envelope.
pub fn to_json(document: &Document) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(document)
}

/// A file name for the export, falling back when the title is empty.
pub fn file_name(document: &Document, extension: &str) -> String {
    let stem: String = document
        .title
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        format!("else-script.{extension}")
    } else {
        format!("{stem}.{extension}")
    }
}

struct Labels {
    part: &'static str,
    knowledge_check: &'static str,
    untitled: &'static str,
    correct: &'static str,
    footer: &'static str,
}

fn labels(language: Language) -> Labels {
    match language {
        Language::En => Labels {
            part: "Part",
            knowledge_check: "Knowledge Check",
            untitled: "Untitled Module",
            correct: "Correct answer",
            footer: "Generated with <strong>ELSE Script Engine</strong>",
        },
        Language::Es => Labels {
            part: "Parte",
            knowledge_check: "Comprobación de conocimientos",
            untitled: "Módulo sin título",
            correct: "Respuesta correcta",
            footer: "Generado con <strong>ELSE Script Engine</strong>",
        },
    }
}

const STYLE: &str = r#"
body { font-family: 'Inter', system-ui, sans-serif; background: #f8fafc; color: #0f172a; margin: 0; padding: 3rem 1rem; }
main { max-width: 56rem; margin: 0 auto; }
header { border-bottom: 1px solid #e2e8f0; padding-bottom: 2rem; margin-bottom: 3rem; }
section { background: #fff; border: 1px solid #f1f5f9; border-radius: 1.5rem; margin-bottom: 3rem; overflow: hidden; }
section.assessment { background: linear-gradient(135deg, #312e81 0%, #0f172a 100%); color: #fff; }
.kicker { font-size: .65rem; font-weight: 800; letter-spacing: .1em; text-transform: uppercase; padding: .75rem 1.5rem; color: #94a3b8; }
.body { padding: 2rem 3rem; }
.media { margin-top: 2rem; border-radius: 1rem; overflow: hidden; background: #000; aspect-ratio: 16 / 9; }
.media img, .media video { width: 100%; height: 100%; object-fit: cover; }
ol.steps li { margin: .75rem 0; font-weight: 500; }
ul.options { list-style: none; padding: 0; }
ul.options li { padding: 1rem; margin: .5rem 0; border-radius: .75rem; border: 1px solid rgba(148, 163, 184, .3); }
ul.options li.correct { border-color: #818cf8; }
abbr { text-decoration: underline wavy #a5b4fc; cursor: help; }
audio { width: 100%; margin-top: 1.5rem; }
footer { text-align: center; color: #94a3b8; font-size: .85rem; padding: 3rem 0; }
@media print { .no-print { display: none; } body { background: #fff; padding: 0; } section { break-inside: avoid; } }
"#;

/// A self-contained HTML page for viewing or printing the document.
///
/// Block content is HTML-bearing prose and is embedded as is; every other
/// text field is escaped.
pub fn to_html(document: &Document, language: Language) -> String {
    let labels = labels(language);
    let title = if document.title.trim().is_empty() {
        labels.untitled
    } else {
        document.title.as_str()
    };

    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"{}\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n<main>\n<header>\n<h1>{}</h1>\n",
        language.code(),
        escape_html(title),
        STYLE,
        escape_html(title),
    );
    if let Some(description) = &document.description {
        let _ = writeln!(html, "<p>{}</p>", escape_html(description));
    }
    html.push_str("</header>\n");

    for (index, block) in document.blocks.iter().enumerate() {
        render_block(&mut html, block, index, &labels);
    }

    let _ = write!(
        html,
        "<footer class=\"no-print\">{}</footer>\n</main>\n</body>\n</html>\n",
        labels.footer
    );
    html
}

fn render_block(html: &mut String, block: &Block, index: usize, labels: &Labels) {
    let kind = block.kind();
    let _ = write!(
        html,
        "<section class=\"{kind}\" id=\"{}\">\n<div class=\"kicker\">{} {} &bull; {kind}</div>\n<div class=\"body\">\n",
        escape_html(block.id.as_str()),
        labels.part,
        index + 1,
    );

    let heading = match (block.title.trim().is_empty(), kind) {
        (true, BlockKind::Assessment) => labels.knowledge_check,
        _ => block.title.as_str(),
    };
    let _ = writeln!(html, "<h2>{}</h2>", escape_html(heading));
    let _ = writeln!(
        html,
        "<div class=\"content\">{}</div>",
        annotate_terms(&block.content, &block.tooltips)
    );

    match &block.body {
        BlockBody::Steps { steps } if !steps.is_empty() => {
            html.push_str("<ol class=\"steps\">\n");
            for step in steps {
                let _ = writeln!(html, "<li>{}</li>", escape_html(step));
            }
            html.push_str("</ol>\n");
        }
        BlockBody::Assessment { options } if !options.is_empty() => {
            html.push_str("<ul class=\"options\">\n");
            for (i, option) in options.iter().enumerate() {
                let letter = char::from(b'A' + (i % 26) as u8);
                if option.is_correct {
                    let _ = writeln!(
                        html,
                        "<li class=\"correct\" title=\"{}\"><strong>{letter}.</strong> {}</li>",
                        labels.correct,
                        escape_html(&option.text)
                    );
                } else {
                    let _ = writeln!(
                        html,
                        "<li><strong>{letter}.</strong> {}</li>",
                        escape_html(&option.text)
                    );
                }
            }
            html.push_str("</ul>\n");
        }
        _ => {}
    }

    match block.assets.display_media() {
        Some(DisplayMedia::Video(url)) => {
            let _ = writeln!(
                html,
                "<div class=\"media\"><video controls src=\"{}\"></video></div>",
                escape_html(url)
            );
        }
        Some(DisplayMedia::Image(url)) => {
            let _ = writeln!(
                html,
                "<div class=\"media\"><img src=\"{}\" alt=\"{}\"></div>",
                escape_html(url),
                escape_html(&block.title)
            );
        }
        None => {}
    }
    if let Some(url) = &block.assets.audio_url {
        let _ = writeln!(html, "<audio controls src=\"{}\"></audio>", escape_html(url));
    }

    html.push_str("</div>\n</section>\n");
}

/// Markup that term annotation must leave intact: tags, comments and entities.
const MARKUP: &str = r"<[A-Za-z/!][^>]*>|&(?:#[0-9]+|#[xX][0-9A-Fa-f]+|[A-Za-z][A-Za-z0-9]*);";

/// Wraps verbatim occurrences of tooltip terms in `<abbr>` elements, touching
/// only text outside of tags and entities. Longer terms win over terms they contain.
fn annotate_terms(content: &str, tooltips: &[Tooltip]) -> String {
    let mut terms: Vec<&Tooltip> = tooltips
        .iter()
        .filter(|t| !t.term.trim().is_empty())
        .collect();
    if terms.is_empty() {
        return content.to_string();
    }
    terms.sort_by(|a, b| b.term.len().cmp(&a.term.len()));

    let alternation = terms
        .iter()
        .map(|t| regex::escape(&t.term))
        .collect::<Vec<_>>()
        .join("|");
    let (Ok(term_re), Ok(markup_re)) = (Regex::new(&alternation), Regex::new(MARKUP)) else {
        return content.to_string();
    };

    let define = |term: &str| {
        terms
            .iter()
            .find(|t| t.term == term)
            .map(|t| t.definition.as_str())
            .unwrap_or_default()
    };
    let annotate_text = |text: &str| {
        term_re
            .replace_all(text, |caps: &regex::Captures| {
                format!(
                    "<abbr title=\"{}\">{}</abbr>",
                    escape_html(define(&caps[0])),
                    &caps[0]
                )
            })
            .into_owned()
    };

    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for markup in markup_re.find_iter(content) {
        out.push_str(&annotate_text(&content[last..markup.start()]));
        out.push_str(markup.as_str());
        last = markup.end();
    }
    out.push_str(&annotate_text(&content[last..]));
    out
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
