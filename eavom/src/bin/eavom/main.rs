mod commands;
mod context;
mod examples;
mod output;
mod theme;

use std::fmt::Write;
use std::io::{self, Write as IoWrite};
use std::path::PathBuf;

use anyhow::Result;
use clap::{
    ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Color as ClapColor, RgbColor, Style},
    },
    error::ErrorKind,
};
use colored::{Color as ThemeColor, Colorize, control::ShouldColorize};

use commands::{
    attributes::{AttributeCommands, handle_attribute_commands},
    enums::{EnumCommands, handle_enum_commands},
    values::{ShowArgs, handle_show},
};
use context::ProjectContext;
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::{GLYPHS, PALETTE};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("REDIS_URL", "Redis connection URL used when the config leaves [redis] url at its default"),
    ("RUST_LOG", "Log filter for env_logger, e.g. eavom=debug"),
];

#[derive(Parser)]
#[command(name = "eavom")]
#[command(version)]
#[command(
    about = "Inspect and seed EAV attribute definitions stored in Redis",
    long_about = r#"Administration CLI for eavom entity-attribute-value stores.

Commands:
  enums       List enum groups or sync them from the config file
  attributes  List attribute definitions or sync them from the config file
  values      Show the stored values of one entity
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Path to the config file (defaults to the nearest .eavom/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enum groups and their values
    #[command(subcommand)]
    Enums(EnumCommands),

    /// Attribute definitions
    #[command(subcommand)]
    Attributes(AttributeCommands),

    /// Stored values
    #[command(subcommand)]
    Values(ValueCommands),
}

#[derive(Subcommand)]
enum ValueCommands {
    /// Show every stored value of one entity
    Show(ShowArgs),
}

impl Cli {
    fn parse_with_styles() -> Self {
        let command = build_cli_command();
        let parsed = command
            .styles(help_styles())
            .try_get_matches()
            .and_then(|matches| Cli::from_arg_matches(&matches));
        match parsed {
            Ok(cli) => cli,
            Err(err) => match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = print_blank_line(&mut io::stdout());
                    if let Err(print_err) = err.print()
                        && print_err.kind() != io::ErrorKind::BrokenPipe
                    {
                        eprintln!("Failed to display help: {print_err}");
                    }
                    std::process::exit(0);
                }
                _ => {
                    let _ = print_blank_line(&mut io::stderr());
                    if let Err(print_err) = err.print()
                        && print_err.kind() != io::ErrorKind::BrokenPipe
                    {
                        eprintln!("Failed to display error: {print_err}");
                    }
                    std::process::exit(err.exit_code());
                }
            },
        }
    }
}

fn build_cli_command() -> Command {
    let use_color = ShouldColorize::from_env().should_colorize();
    let mut command = Cli::command()
        .after_long_help(render_top_level_appendix(use_color))
        .color(if use_color { ColorChoice::Auto } else { ColorChoice::Never });
    for example in command_examples() {
        if let Some(subcommand) = command.find_subcommand_mut(example.name) {
            *subcommand = subcommand
                .clone()
                .after_long_help(render_examples(example.groups, use_color));
        }
    }
    command
}

fn render_examples(groups: &[ExampleGroup], use_color: bool) -> String {
    let mut buffer = String::new();
    let _ = writeln!(buffer, "{}", stylize("Examples:", PALETTE.heading, true, use_color));

    for (index, group) in groups.iter().enumerate() {
        let _ = writeln!(buffer, "  {}", stylize(group.title, PALETTE.schema, true, use_color));
        for command in group.commands {
            let arrow = stylize(GLYPHS.step, PALETTE.command, false, use_color);
            let _ = writeln!(
                buffer,
                "    {arrow} {}",
                stylize(command, PALETTE.command, false, use_color)
            );
        }
        if index + 1 < groups.len() {
            buffer.push('\n');
        }
    }
    buffer
}

fn render_top_level_appendix(use_color: bool) -> String {
    let mut buffer = String::new();
    let _ = writeln!(
        buffer,
        "{}",
        stylize("Environment Variables:", PALETTE.heading, true, use_color)
    );
    for (key, description) in ENVIRONMENT_VARIABLES {
        let _ = writeln!(
            buffer,
            "  {}  {}",
            stylize(key, PALETTE.env_name, true, use_color),
            stylize(description, PALETTE.env_text, false, use_color)
        );
    }
    buffer.push('\n');
    let _ = writeln!(
        buffer,
        "{} {}",
        stylize("Tip:", PALETTE.heading, true, use_color),
        stylize(
            "Use 'eavom <command> --help' to view examples for each command.",
            PALETTE.command,
            false,
            use_color
        )
    );
    buffer
}

fn print_blank_line(target: &mut impl IoWrite) -> io::Result<()> {
    target.write_all(b"\n")?;
    target.flush()
}

fn stylize(text: &str, color: ThemeColor, bold: bool, use_color: bool) -> String {
    match (use_color, bold) {
        (false, _) => text.to_string(),
        (true, true) => text.color(color).bold().to_string(),
        (true, false) => text.color(color).to_string(),
    }
}

fn help_styles() -> Styles {
    Styles::styled()
        .usage(style_from_color(PALETTE.schema).bold())
        .header(style_from_color(PALETTE.heading).bold())
        .literal(style_from_color(PALETTE.command))
        .placeholder(style_from_color(PALETTE.faint))
        .valid(style_from_color(PALETTE.saved))
        .invalid(style_from_color(PALETTE.caution))
        .error(style_from_color(PALETTE.rejected).bold())
}

fn style_from_color(color: ThemeColor) -> Style {
    Style::new().fg_color(Some(color_to_clap_color(color)))
}

fn color_to_clap_color(color: ThemeColor) -> ClapColor {
    let ansi = match color {
        ThemeColor::Black => AnsiColor::Black,
        ThemeColor::Red => AnsiColor::Red,
        ThemeColor::Green => AnsiColor::Green,
        ThemeColor::Yellow => AnsiColor::Yellow,
        ThemeColor::Blue => AnsiColor::Blue,
        ThemeColor::Magenta => AnsiColor::Magenta,
        ThemeColor::Cyan => AnsiColor::Cyan,
        ThemeColor::White => AnsiColor::White,
        ThemeColor::BrightBlack => AnsiColor::BrightBlack,
        ThemeColor::BrightRed => AnsiColor::BrightRed,
        ThemeColor::BrightGreen => AnsiColor::BrightGreen,
        ThemeColor::BrightYellow => AnsiColor::BrightYellow,
        ThemeColor::BrightBlue => AnsiColor::BrightBlue,
        ThemeColor::BrightMagenta => AnsiColor::BrightMagenta,
        ThemeColor::BrightCyan => AnsiColor::BrightCyan,
        ThemeColor::BrightWhite => AnsiColor::BrightWhite,
        ThemeColor::TrueColor { r, g, b } => return ClapColor::Rgb(RgbColor(r, g, b)),
    };
    ClapColor::Ansi(ansi)
}

fn main() {
    env_logger::init();

    let cli = Cli::parse_with_styles();
    if cli.no_color {
        colored::control::set_override(false);
    }

    let output = OutputManager::new(GlobalOptions {
        output_format: cli.output.clone(),
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    });

    if let Err(err) = execute(cli, &output) {
        output.error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

fn execute(cli: Cli, output: &OutputManager) -> Result<()> {
    let context = ProjectContext::load(cli.config.as_deref())?;
    output.verbose(&format!("using config {}", context.config_path.display()));

    match cli.command {
        Commands::Enums(command) => handle_enum_commands(command, &context, output),
        Commands::Attributes(command) => handle_attribute_commands(command, &context, output),
        Commands::Values(ValueCommands::Show(args)) => handle_show(args, &context, output),
    }
}
