//! Binary entry point for the JPQL command-line tool.
#![forbid(unsafe_code)]

mod config;
mod ui;

use std::error::Error;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use jpql::{
    diagnostic::sort_by_position, grammar::bnf_ids, model::build_state,
    query::profile::profile_snapshot, Formatter, Grammar, GrammarRegistry, HelperOptions,
    IdentifierStyle, InMemoryMetadata, QueryHelper,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use config::{CliConfig, ConfigError, Profile, ProfileUpdate};
use ui::{Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "jpql",
    version,
    about = "Parse, validate, format and refactor JPQL queries",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "NAME",
        help = "Grammar to use (see `jpql grammars`)"
    )]
    grammar: Option<String>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        env = "JPQL_CONFIG",
        value_name = "PATH",
        help = "CLI config file"
    )]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "NAME", help = "Config profile to apply")]
    profile: Option<String>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = ThemeArg::Auto,
        help = "Terminal color theme"
    )]
    theme: ThemeArg,

    #[arg(long, global = true, help = "Print bare results without decoration")]
    quiet: bool,

    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "Raise log verbosity (-v debug, -vv trace); JPQL_LOG overrides"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct QueryArg {
    #[arg(value_name = "QUERY", help = "Query text, or - to read standard input")]
    query: String,
}

#[derive(Args, Debug)]
struct MetadataArg {
    #[arg(long, value_name = "FILE", help = "Metadata file (.json or .toml)")]
    metadata: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Parse a query and print it in canonical form")]
    Parse {
        #[command(flatten)]
        input: QueryArg,

        #[arg(long, value_name = "ID", help = "BNF rule to parse against")]
        bnf: Option<String>,

        #[arg(long, help = "Fail on the first syntax error")]
        strict: bool,
    },
    #[command(about = "Reformat a query")]
    Format {
        #[command(flatten)]
        input: QueryArg,

        #[arg(long, help = "Write identifiers in lower case")]
        lowercase: bool,
    },
    #[command(about = "Report grammar and semantic problems (exit code 2 when any)")]
    Validate {
        #[command(flatten)]
        input: QueryArg,

        #[command(flatten)]
        metadata: MetadataArg,

        #[arg(long, help = "Skip semantic validation")]
        grammar_only: bool,
    },
    #[command(about = "Rename a class, entity, enum constant, field or variable")]
    Rename {
        #[command(flatten)]
        input: QueryArg,

        #[command(flatten)]
        metadata: MetadataArg,

        #[arg(value_enum, value_name = "KIND")]
        kind: RenameKind,

        #[arg(value_name = "OLD")]
        old: String,

        #[arg(value_name = "NEW")]
        new: String,

        #[arg(
            long = "type",
            value_name = "TYPE",
            help = "Declaring type of the field (required for field renames)"
        )]
        type_name: Option<String>,
    },
    #[command(about = "List completion proposals at a cursor offset")]
    Complete {
        #[command(flatten)]
        input: QueryArg,

        #[command(flatten)]
        metadata: MetadataArg,

        #[arg(long, value_name = "OFFSET", help = "Byte offset of the cursor")]
        cursor: usize,
    },
    #[command(about = "List the registered grammars")]
    Grammars,
    #[command(subcommand, about = "Manage config profiles")]
    Profile(ProfileCommand),
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    #[command(about = "List profiles")]
    List,
    #[command(about = "Show one profile")]
    Show {
        #[arg(value_name = "NAME")]
        name: String,
    },
    #[command(about = "Create or update a profile")]
    Set {
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(long = "grammar-name", value_name = "NAME", help = "Grammar for the profile")]
        grammar_name: Option<String>,

        #[arg(long, value_name = "FILE", help = "Metadata file for the profile")]
        metadata: Option<PathBuf>,

        #[arg(long, value_enum, help = "Identifier case used when formatting")]
        style: Option<StyleArg>,

        #[arg(long, help = "Parse strictly by default")]
        strict: Option<bool>,
    },
    #[command(about = "Delete a profile")]
    Delete {
        #[arg(value_name = "NAME")]
        name: String,
    },
    #[command(about = "Set or clear the default profile")]
    Default {
        #[arg(value_name = "NAME", help = "Profile name; omit to clear")]
        name: Option<String>,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ThemeArg {
    Auto,
    Light,
    Dark,
    Plain,
}

impl From<ThemeArg> for Theme {
    fn from(theme: ThemeArg) -> Self {
        match theme {
            ThemeArg::Auto => Theme::Auto,
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Plain => Theme::Plain,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum StyleArg {
    Upper,
    Lower,
}

impl From<StyleArg> for IdentifierStyle {
    fn from(style: StyleArg) -> Self {
        match style {
            StyleArg::Upper => IdentifierStyle::Uppercase,
            StyleArg::Lower => IdentifierStyle::Lowercase,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum RenameKind {
    Class,
    Entity,
    Enum,
    Field,
    Variable,
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32, Box<dyn Error>> {
    let cli = Cli::parse();
    install_tracing_subscriber(cli.verbose);
    let ui = Ui::new(cli.theme.into(), cli.quiet);
    let code = execute(&cli, &ui)?;
    if let Some(snapshot) = profile_snapshot(true) {
        eprintln!("profile: {}", serde_json::to_string(&snapshot)?);
    }
    Ok(code)
}

fn execute(cli: &Cli, ui: &Ui) -> Result<i32, Box<dyn Error>> {
    if let Command::Profile(command) = &cli.command {
        let mut config = CliConfig::load(cli.config.clone())?;
        run_profile_command(ui, &mut config, command, cli.format)?;
        return Ok(0);
    }

    let config = CliConfig::load(cli.config.clone())?;
    let session = Session::resolve(cli, &config)?;
    debug!(
        grammar = session.grammar.name(),
        profile = session.profile.map(|p| p.name.as_str()),
        "cli.session.resolved"
    );

    match &cli.command {
        Command::Parse { input, bnf, strict } => {
            let text = read_query(&input.query)?;
            let tolerant = !(*strict || session.profile.and_then(|p| p.strict) == Some(true));
            let bnf = bnf.as_deref().unwrap_or(bnf_ids::QL_STATEMENT);
            let expression = jpql::Parser::parse(&session.grammar, &text, bnf, tolerant)?;
            match cli.format {
                OutputFormat::Json => print_json(&expression)?,
                OutputFormat::Text => {
                    let formatter = Formatter::new(session.style)?;
                    println!("{}", formatter.format(&build_state(expression.root())));
                    ui.diagnostics(&text, expression.diagnostics());
                }
            }
        }
        Command::Format { input, lowercase } => {
            let text = read_query(&input.query)?;
            let style = if *lowercase {
                IdentifierStyle::Lowercase
            } else {
                session.style
            };
            let metadata = InMemoryMetadata::new();
            let mut helper = session.helper(&metadata, style);
            helper.set_query(&text)?;
            let formatted = helper.format()?;
            match cli.format {
                OutputFormat::Json => print_json(&FormatReport { text: &formatted })?,
                OutputFormat::Text => println!("{formatted}"),
            }
        }
        Command::Validate {
            input,
            metadata,
            grammar_only,
        } => {
            let text = read_query(&input.query)?;
            let metadata_path = session.metadata_path(metadata);
            let provider = load_metadata(metadata_path.as_ref())?;
            let mut helper = session.helper(&provider, session.style);
            helper.set_query(&text)?;
            let semantic = !grammar_only && metadata_path.is_some();
            let mut diagnostics = helper.parse_diagnostics().to_vec();
            diagnostics.extend(helper.validate_grammar());
            if semantic {
                diagnostics.extend(helper.validate_semantics());
            }
            sort_by_position(&mut diagnostics);
            let report = ValidationReport {
                grammar: session.grammar.name(),
                semantic,
                diagnostics: &diagnostics,
            };
            match cli.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => {
                    if !semantic && !grammar_only {
                        ui.warn("no metadata file; semantic validation skipped");
                    }
                    if diagnostics.is_empty() {
                        ui.success(&format!("no problems found ({})", session.grammar.name()));
                    } else {
                        ui.diagnostics(&text, &diagnostics);
                    }
                }
            }
            if !diagnostics.is_empty() {
                return Ok(2);
            }
        }
        Command::Rename {
            input,
            metadata,
            kind,
            old,
            new,
            type_name,
        } => {
            let text = read_query(&input.query)?;
            let provider = load_metadata(session.metadata_path(metadata).as_ref())?;
            let mut helper = session.helper(&provider, session.style);
            helper.set_query(&text)?;
            let mut tool = helper.refactoring_tool()?;
            let changes = match kind {
                RenameKind::Class => tool.rename_class_name(old, new)?,
                RenameKind::Entity => tool.rename_entity_name(old, new)?,
                RenameKind::Enum => tool.rename_enum_constant(old, new)?,
                RenameKind::Variable => tool.rename_variable(old, new)?,
                RenameKind::Field => {
                    let type_name = type_name
                        .as_deref()
                        .ok_or("field renames require --type")?;
                    tool.rename_field(type_name, old, new)?
                }
            };
            let renamed = tool.to_actual_text()?;
            match cli.format {
                OutputFormat::Json => print_json(&RenameReport {
                    text: &renamed,
                    changes,
                })?,
                OutputFormat::Text => {
                    println!("{renamed}");
                    if !cli.quiet {
                        ui.info(&format!("{changes} change(s)"));
                    }
                }
            }
        }
        Command::Complete {
            input,
            metadata,
            cursor,
        } => {
            let text = read_query(&input.query)?;
            let provider = load_metadata(session.metadata_path(metadata).as_ref())?;
            let mut helper = session.helper(&provider, session.style);
            helper.set_query(&text)?;
            let proposals = helper.content_assist(*cursor);
            match cli.format {
                OutputFormat::Json => print_json(&proposals)?,
                OutputFormat::Text => ui.proposals(&proposals),
            }
        }
        Command::Grammars => {
            let registry = GrammarRegistry::new();
            let summaries: Vec<GrammarSummary<'_>> = registry
                .iter()
                .map(|grammar| GrammarSummary::of(grammar))
                .collect();
            match cli.format {
                OutputFormat::Json => print_json(&summaries)?,
                OutputFormat::Text => ui.list(
                    "Grammars",
                    summaries.iter().map(|s| {
                        format!(
                            "{} (JPA {}, {}) {}",
                            s.name,
                            s.version,
                            s.provider,
                            s.chain.join(" -> ")
                        )
                    }),
                ),
            }
        }
        Command::Profile(_) => {}
    }
    Ok(0)
}

/// Effective settings after merging flags, the selected profile and config.
struct Session<'c> {
    grammar: Arc<Grammar>,
    style: IdentifierStyle,
    profile: Option<&'c Profile>,
    config: &'c CliConfig,
}

impl<'c> Session<'c> {
    fn resolve(cli: &Cli, config: &'c CliConfig) -> Result<Self, Box<dyn Error>> {
        let profile = match cli.profile.as_deref() {
            Some(name) => Some(config.profile(name).ok_or_else(|| {
                ConfigError::ProfileNotFound {
                    name: name.to_string(),
                }
            })?),
            None => config
                .default_profile_name()
                .and_then(|name| config.profile(name)),
        };
        let registry = GrammarRegistry::new();
        let grammar = match cli
            .grammar
            .as_deref()
            .or_else(|| profile.and_then(|p| p.grammar.as_deref()))
        {
            Some(name) => registry.by_name(name)?,
            None => registry.latest(),
        };
        let style = profile
            .and_then(|p| p.style)
            .map(IdentifierStyle::from)
            .unwrap_or_default();
        Ok(Self {
            grammar,
            style,
            profile,
            config,
        })
    }

    fn metadata_path(&self, arg: &MetadataArg) -> Option<PathBuf> {
        arg.metadata
            .clone()
            .or_else(|| self.profile.and_then(|p| p.metadata.clone()))
            .or_else(|| self.config.default_metadata_path().cloned())
    }

    fn helper<'p>(&self, provider: &'p InMemoryMetadata, style: IdentifierStyle) -> QueryHelper<'p> {
        let options = HelperOptions {
            identifier_style: style,
            ..HelperOptions::default()
        };
        QueryHelper::with_options(Arc::clone(&self.grammar), provider, options)
    }
}

fn run_profile_command(
    ui: &Ui,
    config: &mut CliConfig,
    command: &ProfileCommand,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    match command {
        ProfileCommand::List => {
            let default = config.default_profile_name();
            let names: Vec<String> = config
                .profiles()
                .into_iter()
                .map(|p| {
                    if Some(p.name.as_str()) == default {
                        format!("{} (default)", p.name)
                    } else {
                        p.name.clone()
                    }
                })
                .collect();
            match format {
                OutputFormat::Json => print_json(&names)?,
                OutputFormat::Text if names.is_empty() => {
                    let location = config
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "<none>".into());
                    ui.info(&format!("no profiles in {location}"));
                }
                OutputFormat::Text => ui.list("Profiles", names),
            }
        }
        ProfileCommand::Show { name } => {
            let profile = config
                .profile(name)
                .ok_or_else(|| ConfigError::ProfileNotFound { name: name.clone() })?;
            let summary = ProfileSummary::of(profile);
            match format {
                OutputFormat::Json => print_json(&summary)?,
                OutputFormat::Text => ui.section(
                    &format!("Profile {}", summary.name),
                    [
                        ("grammar", summary.grammar.unwrap_or("-").to_string()),
                        (
                            "metadata",
                            summary.metadata.unwrap_or_else(|| "-".into()),
                        ),
                        ("style", summary.style.unwrap_or("-").to_string()),
                        (
                            "strict",
                            summary
                                .strict
                                .map(|s| s.to_string())
                                .unwrap_or_else(|| "-".into()),
                        ),
                    ],
                ),
            }
        }
        ProfileCommand::Set {
            name,
            grammar_name,
            metadata,
            style,
            strict,
        } => {
            if let Some(grammar) = grammar_name {
                GrammarRegistry::new().by_name(grammar)?;
            }
            config.upsert_profile(
                name,
                ProfileUpdate {
                    grammar: grammar_name.clone(),
                    metadata: metadata.clone(),
                    style: *style,
                    strict: *strict,
                },
            );
            let path = config.persist()?;
            ui.success(&format!("profile '{name}' saved to {}", path.display()));
        }
        ProfileCommand::Delete { name } => {
            config.delete_profile(name)?;
            let path = config.persist()?;
            ui.success(&format!("profile '{name}' deleted from {}", path.display()));
        }
        ProfileCommand::Default { name } => {
            config.set_default_profile(name.as_deref())?;
            let path = config.persist()?;
            match name {
                Some(name) => ui.success(&format!("default profile set to '{name}'")),
                None => ui.success("default profile cleared"),
            }
            debug!(path = %path.display(), "cli.config.persisted");
        }
    }
    Ok(())
}

fn install_tracing_subscriber(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("JPQL_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_query(arg: &str) -> Result<String, Box<dyn Error>> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    Ok(text.trim_end().to_string())
}

fn load_metadata(path: Option<&PathBuf>) -> Result<InMemoryMetadata, Box<dyn Error>> {
    match path {
        Some(path) => Ok(InMemoryMetadata::load(path)?),
        None => Ok(InMemoryMetadata::new()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct FormatReport<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct ValidationReport<'a> {
    grammar: &'a str,
    semantic: bool,
    diagnostics: &'a [jpql::Diagnostic],
}

#[derive(Serialize)]
struct RenameReport<'a> {
    text: &'a str,
    changes: usize,
}

#[derive(Serialize)]
struct GrammarSummary<'a> {
    name: &'a str,
    version: String,
    provider: String,
    chain: Vec<&'a str>,
}

impl<'a> GrammarSummary<'a> {
    fn of(grammar: &'a Grammar) -> Self {
        Self {
            name: grammar.name(),
            version: grammar.version().to_string(),
            provider: format!("{:?}", grammar.provider()),
            chain: grammar.chain(),
        }
    }
}

#[derive(Serialize)]
struct ProfileSummary<'a> {
    name: &'a str,
    grammar: Option<&'a str>,
    metadata: Option<String>,
    style: Option<&'static str>,
    strict: Option<bool>,
}

impl<'a> ProfileSummary<'a> {
    fn of(profile: &'a Profile) -> Self {
        Self {
            name: &profile.name,
            grammar: profile.grammar.as_deref(),
            metadata: profile.metadata.as_ref().map(|p| p.display().to_string()),
            style: profile.style.map(|s| match s {
                StyleArg::Upper => "upper",
                StyleArg::Lower => "lower",
            }),
            strict: profile.strict,
        }
    }
}
