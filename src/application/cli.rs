use std::io;
use std::io::Write;
use std::path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use strum::IntoEnumIterator;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use yansi::Paint;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::models_for;
use crate::domain::models::BackendName;
use crate::domain::models::HostBox;
use crate::domain::services::AiService;
use crate::domain::services::language_for_path;
use crate::domain::services::truncate_code;
use crate::domain::services::AppState;
use crate::domain::services::EditorContext;
use crate::domain::services::FallbackPolicy;
use crate::domain::services::ProjectParser;
use crate::domain::services::ProjectStructure;
use crate::domain::services::QuickEditRequest;
use crate::domain::services::RefactorAction;
use crate::domain::services::RefactorRequest;
use crate::domain::services::Severity;
use crate::infrastructure::host::local::LocalHost;
use crate::infrastructure::secrets::memory::MemorySecretStore;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

/// Prints whatever `text` gained since the last call.
fn print_delta(printed: &mut usize, text: &str) {
    if let Some(delta) = text.get(*printed..) {
        print!("{delta}");
        let _ = io::stdout().flush();
    }
    *printed = text.len();
}

fn provider_ids() -> Vec<&'static str> {
    return BackendName::iter().map(|e| return e.id()).collect();
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(config_file_path.clone()).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

/// Wires the store against the loaded configuration.
fn app_state() -> Result<AppState> {
    let provider_str = Config::get(ConfigKey::Provider);
    let Some(provider) = BackendName::parse_loose(&provider_str) else {
        bail!(format!("Unknown provider: {provider_str}"));
    };

    let host: HostBox = Arc::new(LocalHost::default());
    let ai = AiService::new(host).with_fallback(FallbackPolicy::from_config());
    let state = AppState::new(Arc::new(ai), Arc::new(MemorySecretStore::from_config()));
    state.load_api_keys();
    state.set_provider(provider);

    let mut model = Config::get(ConfigKey::Model);
    if model.is_empty() {
        if let Some(info) = models_for(provider).first() {
            tracing::debug!(provider = %provider, model = info.id, "No model set, using catalog default");
            model = info.id.to_string();
        }
    }
    state.set_model(&model);

    let system_prompt = Config::get(ConfigKey::SystemPrompt);
    if !system_prompt.is_empty() {
        state.set_system_prompt(&system_prompt);
    }

    return Ok(state);
}

/// Longest file sent along with a question, in lines.
const CONTEXT_MAX_LINES: usize = 400;

/// Reads a source file and the language its extension implies.
async fn read_source(file: &str) -> Result<(String, String)> {
    let code = fs::read_to_string(file).await?;
    let language = language_for_path(file).unwrap_or_else(|| return "text".to_string());

    return Ok((code, language));
}

async fn run_ask_about(prompt: &str, file: &str) -> Result<()> {
    let state = app_state()?;
    let code = fs::read_to_string(file).await?;
    let context = EditorContext::for_file(file, &truncate_code(&code, CONTEXT_MAX_LINES));
    eprintln!("{}", Paint::new(context.summary()).dimmed());

    println!("{}", state.ask_in_context(prompt, &context).await?);
    return Ok(());
}

async fn run_ask(prompt: &str, file: Option<&String>) -> Result<()> {
    if let Some(file) = file {
        return run_ask_about(prompt, file).await;
    }

    let state = app_state()?;
    let res = state.complete(prompt).await?;

    println!("{}", res.content);
    if let Some(usage) = res.usage {
        eprintln!(
            "{}",
            Paint::new(format!(
                "{} prompt + {} completion tokens, ${:.6}",
                usage.prompt_tokens, usage.completion_tokens, res.cost
            ))
            .dimmed()
        );
    }

    return Ok(());
}

async fn run_generate(prompt: &str) -> Result<()> {
    let state = app_state()?;

    let mut printed = 0;
    state
        .generate_code(prompt, |text| {
            print_delta(&mut printed, text);
        })
        .await?;
    println!();

    let code = state.generated_code();
    if code.is_empty() {
        eprintln!("{}", Paint::yellow("No code block found in the response."));
        return Ok(());
    }

    println!("\n{}\n{code}", Paint::new("Extracted code").bold().underline());
    return Ok(());
}

fn print_project(project: &ProjectStructure) {
    println!("\n{}", Paint::new(&project.name).bold().underline());

    for (dir, files) in ProjectStructure::group_by_directory(&project.files) {
        println!("{dir}");
        for file in files {
            println!("  - {} ({} bytes)", file.path, file.content.len());
        }
    }
}

async fn write_project(project: &ProjectStructure, out: &str) -> Result<()> {
    let resolved = project.resolve_file_paths(out);

    for (file, target) in project.files.iter().zip(resolved) {
        if !file.is_contained() {
            tracing::warn!(path = %file.path, "Skipping file outside of the output directory");
            eprintln!(
                "{}",
                Paint::yellow(format!("Skipped {}, it escapes {out}", file.path))
            );
            continue;
        }

        let target_path = path::PathBuf::from(&target.path);
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target_path, format!("{}\n", target.content)).await?;
        println!("Wrote {}", target.path);
    }

    return Ok(());
}

async fn run_project(prompt: &str, out: Option<&String>) -> Result<()> {
    let state = app_state()?;

    let mut printed = 0;
    let text = state
        .generate_project(prompt, |text| {
            print_delta(&mut printed, text);
        })
        .await?;
    println!();

    let Some(project) = ProjectParser::parse_response(&text) else {
        bail!("No files found in the response");
    };
    print_project(&project);

    if let Some(out) = out {
        write_project(&project, out).await?;
    }

    return Ok(());
}

async fn run_edit(file: &str, instruction: &str, write: bool) -> Result<()> {
    let state = app_state()?;
    let (code, language) = read_source(file).await?;

    let edit = state
        .quick_edit(&QuickEditRequest {
            code,
            instruction: instruction.to_string(),
            language,
        })
        .await?;
    print!("{}", edit.render_diff());

    if write {
        fs::write(file, format!("{}\n", edit.edited_code)).await?;
        println!("Wrote {file}");
    }

    return Ok(());
}

async fn run_refactor(file: &str, action: RefactorAction, context: Option<&String>) -> Result<()> {
    let state = app_state()?;
    let (code, language) = read_source(file).await?;

    let res = state
        .refactor(&RefactorRequest {
            code,
            action,
            language: language.to_string(),
            context: context.cloned(),
        })
        .await?;

    println!("{}", Paint::new(action.label()).bold().underline());
    println!("```{language}\n{}\n```\n", res.refactored_code);
    println!("{}", res.explanation);
    return Ok(());
}

async fn run_review(file: &str) -> Result<()> {
    let state = app_state()?;
    let (code, language) = read_source(file).await?;

    let review = state.review(&code, &language, Some(file)).await?;
    println!("{}", Paint::new(&review.summary).bold());

    for suggestion in review.suggestions {
        let mut location = suggestion.line.to_string();
        if let Some(column) = suggestion.column {
            location.push_str(&format!(":{column}"));
        }
        if let Some(end_line) = suggestion.end_line {
            location.push_str(&format!("-{end_line}"));
            if let Some(end_column) = suggestion.end_column {
                location.push_str(&format!(":{end_column}"));
            }
        }

        let severity = match suggestion.severity {
            Severity::Error => Paint::red(suggestion.severity.to_string()),
            Severity::Warning => Paint::yellow(suggestion.severity.to_string()),
            Severity::Info => Paint::blue(suggestion.severity.to_string()),
        };
        println!(
            "{file}:{location} {severity} [{}] {}",
            suggestion.category, suggestion.message
        );
        if let Some(fix) = suggestion.fix {
            println!("  {} {fix}", Paint::new("fix:").dimmed());
        }
    }

    return Ok(());
}

async fn run_explain(file: &str) -> Result<()> {
    let state = app_state()?;
    let (code, language) = read_source(file).await?;

    println!("{}", state.explain(&code, &language).await?);
    return Ok(());
}

async fn run_document(file: &str) -> Result<()> {
    let state = app_state()?;
    let (code, language) = read_source(file).await?;

    println!("{}", state.document(&code, &language).await?);
    return Ok(());
}

async fn run_tests(file: &str, framework: &str) -> Result<()> {
    let state = app_state()?;
    let (code, language) = read_source(file).await?;

    let tests = state.generate_tests(&code, &language, framework).await?;
    println!("{}", tests.code);
    eprintln!(
        "{}",
        Paint::new(format!("{}: {}", tests.framework, tests.coverage.join(", "))).dimmed()
    );
    return Ok(());
}

async fn run_readme(dir: &str) -> Result<()> {
    let state = app_state()?;

    let mut files = vec![];
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        files.push(entry.file_name().to_string_lossy().to_string());
    }
    files.sort();

    let project = fs::canonicalize(dir)
        .await?
        .file_name()
        .map(|name| return name.to_string_lossy().to_string())
        .unwrap_or_else(|| return dir.to_string());

    println!("{}", state.write_readme(&project, &files).await?);
    return Ok(());
}

fn print_providers() {
    for backend in BackendName::iter() {
        let kind = if backend.is_local() { "local" } else { "cloud" };
        let key = if backend.requires_api_key() {
            ", API key required"
        } else {
            ""
        };
        println!(
            "{} ({}, {kind}{key}) {}",
            Paint::new(backend.to_string()).bold(),
            backend.id(),
            backend.default_url()
        );

        for info in models_for(backend) {
            let price = match info.price {
                Some(price) => format!(
                    "${}/1K input, ${}/1K output",
                    price.input_per_thousand, price.output_per_thousand
                ),
                None => "free".to_string(),
            };
            println!(
                "  - {} ({}), {} tokens, {price}",
                info.id, info.name, info.context_window
            );
        }
    }
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_generate() -> Command {
    return Command::new("generate")
        .about("Streams a response for a prompt and prints the first code block found in it.")
        .arg(
            Arg::new("prompt")
                .help("What to build.")
                .num_args(1)
                .required(true),
        );
}

fn subcommand_ask() -> Command {
    return Command::new("ask")
        .about("Sends a single prompt without streaming and prints the answer with its token usage and cost.")
        .arg(
            Arg::new("prompt")
                .help("What to ask.")
                .num_args(1)
                .required(true),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .help("Source file to ask about. Its path, language and content are sent as context.")
                .num_args(1),
        );
}

fn arg_file() -> Arg {
    return Arg::new("file")
        .help("Source file to work on.")
        .num_args(1)
        .required(true);
}

fn subcommand_edit() -> Command {
    return Command::new("edit")
        .about("Edits a file following an instruction and prints a line diff.")
        .arg(arg_file())
        .arg(
            Arg::new("instruction")
                .short('i')
                .long("instruction")
                .help("What to change.")
                .num_args(1)
                .required(true),
        )
        .arg(
            Arg::new("write")
                .short('w')
                .long("write")
                .help("Overwrite the file with the edited code.")
                .action(ArgAction::SetTrue),
        );
}

fn subcommand_refactor() -> Command {
    let actions = RefactorAction::iter()
        .map(|action| return format!("{action} ({})", action.label()))
        .collect::<Vec<String>>()
        .join(", ");

    return Command::new("refactor")
        .about("Applies a refactoring to a file and explains the result.")
        .arg(arg_file())
        .arg(
            Arg::new("action")
                .short('a')
                .long("action")
                .help(format!("Refactoring to apply: {actions}."))
                .num_args(1)
                .required(true)
                .value_parser(PossibleValuesParser::new(
                    RefactorAction::iter()
                        .map(|action| return action.to_string())
                        .collect::<Vec<String>>(),
                )),
        )
        .arg(
            Arg::new("context")
                .long("context")
                .help("Extra context about how the code is used.")
                .num_args(1),
        );
}

fn subcommand_tests() -> Command {
    return Command::new("tests")
        .about("Generates unit tests for a file.")
        .arg(arg_file())
        .arg(
            Arg::new("framework")
                .long("framework")
                .help("Test framework to write the tests for.")
                .num_args(1)
                .default_value("jest"),
        );
}

fn subcommand_readme() -> Command {
    return Command::new("readme")
        .about("Writes a README for a project directory.")
        .arg(
            Arg::new("dir")
                .help("Project directory.")
                .num_args(1)
                .default_value("."),
        );
}

fn subcommand_project() -> Command {
    return Command::new("project")
        .about("Generates a multi-file project and lists the files found in the response.")
        .arg(
            Arg::new("prompt")
                .help("What to build.")
                .num_args(1)
                .required(true),
        )
        .arg(
            Arg::new("out")
                .short('o')
                .long("out")
                .help("Directory to write the generated files to. Files that would land outside of it are skipped.")
                .num_args(1),
        );
}

fn arg_config(key: ConfigKey, help: String) -> Arg {
    return Arg::new(key.to_string())
        .long(key.to_string())
        .env(key.env_var())
        .hide_env_values(key.is_secret())
        .num_args(1)
        .help(help)
        .global(true);
}

fn with_default(help: &str, key: ConfigKey) -> String {
    return format!("{help} [default: {}]", Config::default(key));
}

pub fn build() -> Command {
    let about = format!(
        "{}\n\nVersion: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
    );

    return Command::new("vibe-studio")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(true)
        .subcommand(subcommand_ask())
        .subcommand(subcommand_generate())
        .subcommand(subcommand_project())
        .subcommand(subcommand_edit())
        .subcommand(subcommand_refactor())
        .subcommand(
            Command::new("review")
                .about("Reviews a file and lists suggestions by line.")
                .arg(arg_file()),
        )
        .subcommand(
            Command::new("explain")
                .about("Explains what a file does in plain terms.")
                .arg(arg_file()),
        )
        .subcommand(
            Command::new("document")
                .about("Generates a documentation comment for a file's code.")
                .arg(arg_file()),
        )
        .subcommand(subcommand_tests())
        .subcommand(subcommand_readme())
        .subcommand(Command::new("providers").about("Lists every provider with its known models and prices."))
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .arg(
            arg_config(ConfigKey::Provider, with_default("The provider to generate with.", ConfigKey::Provider))
                .short('p')
                .value_parser(PossibleValuesParser::new(provider_ids())),
        )
        .arg(
            arg_config(ConfigKey::Model, "The model to generate with. Defaults to the first known model of the provider if not set.".to_string())
                .short('m'),
        )
        .arg(arg_config(
            ConfigKey::SystemPrompt,
            "System prompt sent ahead of every prompt. A built-in coding prompt is used if not set.".to_string(),
        ))
        .arg(
            arg_config(ConfigKey::ConfigFile, with_default("Path to configuration file", ConfigKey::ConfigFile))
                .short('c'),
        )
        .arg(arg_config(
            ConfigKey::RequestTimeout,
            with_default("Time to wait in milliseconds before timing out a request to a provider.", ConfigKey::RequestTimeout),
        ))
        .arg(arg_config(
            ConfigKey::OllamaURL,
            with_default("Ollama API URL used by the local host.", ConfigKey::OllamaURL),
        ))
        .arg(arg_config(
            ConfigKey::LmStudioURL,
            with_default("LM Studio API URL used by the local host.", ConfigKey::LmStudioURL),
        ))
        .arg(arg_config(
            ConfigKey::OpenAiURL,
            with_default("OpenAI API URL. Can be swapped to a compatible proxy.", ConfigKey::OpenAiURL),
        ))
        .arg(arg_config(ConfigKey::OpenAiToken, "OpenAI API token.".to_string()))
        .arg(arg_config(
            ConfigKey::AnthropicURL,
            with_default("Anthropic API URL.", ConfigKey::AnthropicURL),
        ))
        .arg(arg_config(ConfigKey::AnthropicToken, "Anthropic API token.".to_string()))
        .arg(arg_config(
            ConfigKey::GeminiURL,
            with_default("Google Gemini API URL.", ConfigKey::GeminiURL),
        ))
        .arg(arg_config(ConfigKey::GeminiToken, "Google Gemini API token.".to_string()))
        .arg(arg_config(
            ConfigKey::OpenRouterURL,
            with_default("OpenRouter API URL.", ConfigKey::OpenRouterURL),
        ))
        .arg(arg_config(ConfigKey::OpenRouterToken, "OpenRouter API token.".to_string()))
        .arg(
            arg_config(
                ConfigKey::FallbackBackend,
                "Provider to retry with once when a local provider fails to answer.".to_string(),
            )
            .value_parser(PossibleValuesParser::new(provider_ids())),
        )
        .arg(arg_config(
            ConfigKey::FallbackModel,
            "Model to use with the fallback provider.".to_string(),
        ));
}

pub async fn parse() -> Result<()> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("generate", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            let Some(prompt) = subcmd_matches.get_one::<String>("prompt") else {
                subcommand_generate().print_long_help()?;
                return Ok(());
            };

            run_generate(prompt).await?;
        }
        Some(("ask", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            let Some(prompt) = subcmd_matches.get_one::<String>("prompt") else {
                subcommand_ask().print_long_help()?;
                return Ok(());
            };

            run_ask(prompt, subcmd_matches.get_one::<String>("file")).await?;
        }
        Some(("edit", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            let (Some(file), Some(instruction)) = (
                subcmd_matches.get_one::<String>("file"),
                subcmd_matches.get_one::<String>("instruction"),
            ) else {
                subcommand_edit().print_long_help()?;
                return Ok(());
            };

            run_edit(file, instruction, subcmd_matches.get_flag("write")).await?;
        }
        Some(("refactor", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            let (Some(file), Some(action)) = (
                subcmd_matches.get_one::<String>("file"),
                subcmd_matches.get_one::<String>("action"),
            ) else {
                subcommand_refactor().print_long_help()?;
                return Ok(());
            };

            let action = RefactorAction::from_str(action)?;
            run_refactor(file, action, subcmd_matches.get_one::<String>("context")).await?;
        }
        Some((name @ ("review" | "explain" | "document"), subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            let Some(file) = subcmd_matches.get_one::<String>("file") else {
                build().print_long_help()?;
                return Ok(());
            };

            match name {
                "review" => run_review(file).await?,
                "explain" => run_explain(file).await?,
                _ => run_document(file).await?,
            }
        }
        Some(("tests", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            let (Some(file), Some(framework)) = (
                subcmd_matches.get_one::<String>("file"),
                subcmd_matches.get_one::<String>("framework"),
            ) else {
                subcommand_tests().print_long_help()?;
                return Ok(());
            };

            run_tests(file, framework).await?;
        }
        Some(("readme", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            let dir = subcmd_matches
                .get_one::<String>("dir")
                .map(|dir| return dir.as_str())
                .unwrap_or(".");

            run_readme(dir).await?;
        }
        Some(("project", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            let Some(prompt) = subcmd_matches.get_one::<String>("prompt") else {
                subcommand_project().print_long_help()?;
                return Ok(());
            };

            run_project(prompt, subcmd_matches.get_one::<String>("out")).await?;
        }
        Some(("providers", _)) => {
            print_providers();
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
            }
            _ => {
                subcommand_config().print_long_help()?;
            }
        },
        _ => {
            build().print_long_help()?;
        }
    }

    return Ok(());
}
