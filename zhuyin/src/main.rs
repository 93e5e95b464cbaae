//! Interactive demo CLI: feeds raw ASCII keystrokes through a [`zhuyin_engine::Engine`]
//! and prints the resulting state after each key, the way the teacher's own
//! `libzhuyin` binary offered a REPL over its `Engine::input`.

use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use zhuyin_engine::config::LayoutKind;
use zhuyin_engine::dictionary::StaticDictionary;
use zhuyin_engine::user_phrase::MemoryUserPhraseStore;
use zhuyin_engine::{build_engine, ZhuyinConfig};
use zhuyin_engine_core::key_handler::{HandleOutcome, KeyEvent, KeyName, State};

const DEMO_DICTIONARY: &str = "\
ㄋㄧˇ 你 -1.0 妳 -3.2
ㄏㄠˇ 好 -1.1
ㄋㄧˇㄏㄠˇ 你好 -0.5
ㄓㄨㄥ ㄍㄨㄛˊ 中国 -0.8
";

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LayoutArg {
    Standard,
    Eten,
    Hsu,
    Eten26,
    HanyuPinyin,
    Ibm,
}

impl From<LayoutArg> for LayoutKind {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Standard => LayoutKind::Standard,
            LayoutArg::Eten => LayoutKind::ETen,
            LayoutArg::Hsu => LayoutKind::Hsu,
            LayoutArg::Eten26 => LayoutKind::ETen26,
            LayoutArg::HanyuPinyin => LayoutKind::HanyuPinyin,
            LayoutArg::Ibm => LayoutKind::IBM,
        }
    }
}

#[derive(Parser)]
#[command(name = "zhuyin-demo")]
#[command(about = "Drives the zhuyin-engine composition engine from the terminal")]
#[command(version)]
struct Cli {
    /// Keyboard layout to compose with.
    #[arg(long, value_enum, default_value_t = LayoutArg::Standard)]
    layout: LayoutArg,

    /// Static dictionary file (`key value score value score…` per line).
    #[arg(long)]
    dictionary: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive REPL: each line of input is replayed key by key.
    Repl,
    /// Feed a single line of keystrokes and print the resulting state.
    Test { input: String },
}

fn load_dictionary(path: &Option<std::path::PathBuf>) -> StaticDictionary {
    match path {
        Some(p) => StaticDictionary::load_file(p).unwrap_or_else(|e| {
            eprintln!("warning: failed to load dictionary at {}: {e}", p.display());
            StaticDictionary::load_str(DEMO_DICTIONARY)
        }),
        None => StaticDictionary::load_str(DEMO_DICTIONARY),
    }
}

fn key_event_for(ch: char) -> KeyEvent {
    match ch {
        ' ' => KeyEvent::named(KeyName::Space),
        '\u{8}' => KeyEvent::named(KeyName::Backspace),
        _ => KeyEvent::ascii(ch),
    }
}

fn print_state(state: &State) {
    match state {
        State::Empty | State::EmptyIgnoringPrevious => println!("  (empty)"),
        State::Committing { text } => println!("  commit: {text}"),
        State::Inputting { base, evicted_text } => {
            println!("  inputting: \"{}\" cursor={} tooltip={:?}", base.buffer, base.cursor, base.tooltip);
            if !evicted_text.is_empty() {
                println!("  evicted: {evicted_text}");
            }
        }
        State::ChoosingCandidate { base, candidates } => {
            println!("  choosing at cursor={}: \"{}\"", base.cursor, base.buffer);
            for (i, c) in candidates.iter().enumerate() {
                println!("    {}. {c}", i + 1);
            }
        }
        State::Marking { base, marked, acceptable, .. } => {
            println!(
                "  marking: \"{}\" marked=\"{marked}\" acceptable={acceptable}",
                base.buffer
            );
        }
    }
}

fn feed_line(
    engine: &mut zhuyin_engine::Engine<MemoryUserPhraseStore, StaticDictionary>,
    line: &str,
) {
    for ch in line.chars() {
        match engine.handle(key_event_for(ch)) {
            HandleOutcome::Consumed { state, error } => {
                if let Some(err) = error {
                    println!("  ! {err}");
                }
                print_state(&state);
            }
            HandleOutcome::NotConsumed => println!("  (key not consumed: '{ch}')"),
        }
    }
}

fn run_repl(mut engine: zhuyin_engine::Engine<MemoryUserPhraseStore, StaticDictionary>) {
    println!("zhuyin-demo — type keystrokes and press Enter. Ctrl-D to exit.");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush().ok();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => feed_line(&mut engine, line.trim_end_matches('\n')),
            Err(e) => {
                eprintln!("error reading stdin: {e}");
                break;
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let mut config = ZhuyinConfig::default();
    config.layout = cli.layout.into();
    let dict = load_dictionary(&cli.dictionary);
    let mut engine = build_engine(config, MemoryUserPhraseStore::new(), dict, None);

    match cli.command {
        Some(Commands::Repl) | None => run_repl(engine),
        Some(Commands::Test { input }) => {
            println!("input: {input}");
            feed_line(&mut engine, &input);
        }
    }
}
