use std::fmt::Display;
use std::io::IsTerminal;

use jpql::{Diagnostic, Proposal, ProposalKind, Severity};
use nu_ansi_term::{Color, Style};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Theme {
    Auto,
    Light,
    Dark,
    Plain,
}

/// What a piece of terminal output stands for; each role maps to one style.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Role {
    Heading,
    Label,
    Excerpt,
    Ok,
    Note,
    Warning,
    Error,
    Entity,
    Attribute,
    Variable,
    Keyword,
}

impl Role {
    fn marker(self) -> &'static str {
        match self {
            Role::Heading => "▸",
            Role::Ok => "✔",
            Role::Note => "ℹ",
            Role::Warning => "⚠",
            Role::Error => "✖",
            _ => "•",
        }
    }

    fn dark(self) -> Style {
        let style = Style::new();
        match self {
            Role::Heading => style.fg(Color::Purple).bold(),
            Role::Label => style.fg(Color::LightBlue).bold(),
            Role::Excerpt => style.fg(Color::White).italic(),
            Role::Ok => style.fg(Color::LightGreen).bold(),
            Role::Note => style.fg(Color::LightCyan),
            Role::Warning => style.fg(Color::Yellow).bold(),
            Role::Error => style.fg(Color::LightRed).bold(),
            Role::Entity => style.fg(Color::LightGreen),
            Role::Attribute => style.fg(Color::LightCyan),
            Role::Variable => style.fg(Color::LightPurple),
            Role::Keyword => style.fg(Color::LightBlue),
        }
    }

    fn light(self) -> Style {
        let style = Style::new();
        match self {
            Role::Heading => style.fg(Color::Blue).bold(),
            Role::Label => style.fg(Color::Black).bold(),
            Role::Excerpt => style.fg(Color::DarkGray).italic(),
            Role::Ok => style.fg(Color::Green).bold(),
            Role::Note => style.fg(Color::Purple),
            Role::Warning => style.fg(Color::Yellow).bold(),
            Role::Error => style.fg(Color::Red).bold(),
            Role::Entity => style.fg(Color::Green),
            Role::Attribute => style.fg(Color::Cyan),
            Role::Variable => style.fg(Color::Purple),
            Role::Keyword => style.fg(Color::Blue),
        }
    }
}

impl From<ProposalKind> for Role {
    fn from(kind: ProposalKind) -> Self {
        match kind {
            ProposalKind::Entity => Role::Entity,
            ProposalKind::Attribute => Role::Attribute,
            ProposalKind::IdentificationVariable => Role::Variable,
            ProposalKind::Identifier => Role::Keyword,
        }
    }
}

/// Terminal output for the text format. Colors only when stdout is a tty.
pub struct Ui {
    theme: Theme,
    paint: bool,
    quiet: bool,
}

impl Ui {
    pub fn new(theme: Theme, quiet: bool) -> Self {
        let paint = theme != Theme::Plain && !quiet && std::io::stdout().is_terminal();

        #[cfg(windows)]
        if paint {
            let _ = nu_ansi_term::enable_ansi_support();
        }

        Self {
            theme,
            paint,
            quiet,
        }
    }

    fn paint(&self, role: Role, text: impl Display) -> String {
        if !self.paint {
            return text.to_string();
        }
        let style = match self.theme {
            Theme::Light => role.light(),
            Theme::Auto | Theme::Dark => role.dark(),
            Theme::Plain => Style::new(),
        };
        style.paint(text.to_string()).to_string()
    }

    fn heading(&self, title: &str) {
        if self.quiet {
            println!("{title}");
        } else {
            println!("{}", self.paint(Role::Heading, format!("{} {title}", Role::Heading.marker())));
        }
    }

    /// Key/value block with right-aligned keys.
    pub fn section<'a, I, V>(&self, title: &str, rows: I)
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Display,
    {
        let rows: Vec<(&str, String)> = rows
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect();
        let Some(width) = rows.iter().map(|(key, _)| key.len()).max() else {
            return;
        };
        self.heading(title);
        for (key, value) in rows {
            println!("  {} {value}", self.paint(Role::Label, format!("{key:>width$}:")));
        }
    }

    pub fn list<I>(&self, title: &str, entries: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut entries = entries.into_iter().peekable();
        if entries.peek().is_none() {
            return;
        }
        self.heading(title);
        let bullet = if self.paint { "•" } else { "-" };
        for entry in entries {
            println!("  {} {entry}", self.paint(Role::Label, bullet));
        }
    }

    /// Completion labels, one per line, colored by proposal kind.
    pub fn proposals(&self, proposals: &[Proposal]) {
        for proposal in proposals {
            println!("{}", self.paint(proposal.kind.into(), &proposal.label));
        }
    }

    /// Prints diagnostics with the query excerpt each one points at.
    pub fn diagnostics(&self, query: &str, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            let role = match diagnostic.severity {
                Severity::Error => Role::Error,
                Severity::Warning => Role::Warning,
            };
            let line = format!(
                "{}..{} {}: {}",
                diagnostic.span.start, diagnostic.span.end, diagnostic.key, diagnostic.message
            );
            if self.quiet {
                println!("{line}");
                continue;
            }
            println!("{} {line}", self.paint(role, role.marker()));
            let excerpt = query
                .get(diagnostic.span.start..diagnostic.span.end)
                .unwrap_or_default();
            if !excerpt.is_empty() {
                println!("    {}", self.paint(Role::Excerpt, format!("`{excerpt}`")));
            }
        }
    }

    pub fn info(&self, message: &str) {
        self.status(Role::Note, message);
    }

    pub fn success(&self, message: &str) {
        self.status(Role::Ok, message);
    }

    /// Warnings go to stderr so piped query text stays clean.
    pub fn warn(&self, message: &str) {
        if self.quiet {
            eprintln!("{message}");
        } else {
            eprintln!("{} {message}", self.paint(Role::Warning, Role::Warning.marker()));
        }
    }

    fn status(&self, role: Role, message: &str) {
        if self.quiet {
            println!("{message}");
        } else {
            println!("{} {message}", self.paint(role, role.marker()));
        }
    }
}
