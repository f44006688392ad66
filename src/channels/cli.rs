//! CLI front end: stdin/stdout REPL driving one training session.

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

use crate::scenario::{Campaign, Mood};
use crate::session::{Command, SessionDriver};

const HELP: &str = "\
コマンド:
  /models           モデル一覧
  /model <id>       モデルを選択
  /campaign <n>     キャンペーンを選択 (1-7)
  /mood <n>         お客様タイプを選択 (1-5)
  /call             お客様を呼ぶ
  /start            接客開始
  /reset            リセット
  /view             画面を再表示
  /quit             終了
  それ以外の入力は店員の発言として送信されます。";

/// One parsed line of terminal input.
#[derive(Debug)]
pub enum CliInput {
    Run(Command),
    ListModels,
    View,
    Help,
    Quit,
    Invalid(String),
}

/// Parse a trimmed, non-empty input line.
pub fn parse_line(line: &str) -> CliInput {
    let Some(rest) = line.strip_prefix('/') else {
        return CliInput::Run(Command::Say(line.to_string()));
    };
    let (cmd, arg) = match rest.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (rest, ""),
    };

    match cmd {
        "models" => CliInput::ListModels,
        "model" if arg.is_empty() => CliInput::Invalid("使い方: /model <id>".into()),
        "model" => CliInput::Run(Command::Configure {
            api_key: None,
            model: Some(arg.to_string()),
        }),
        "campaign" => match Campaign::parse(arg) {
            Some(c) => CliInput::Run(Command::SelectCampaign(c)),
            None => CliInput::Invalid(format!("不明なキャンペーン: {arg}")),
        },
        "mood" => match Mood::parse(arg) {
            Some(m) => CliInput::Run(Command::SelectMood(m)),
            None => CliInput::Invalid(format!("不明なお客様タイプ: {arg}")),
        },
        "call" => CliInput::Run(Command::CallCustomer),
        "start" => CliInput::Run(Command::StartServing),
        "reset" => CliInput::Run(Command::Reset),
        "view" => CliInput::View,
        "help" => CliInput::Help,
        "quit" | "exit" => CliInput::Quit,
        other => CliInput::Invalid(format!("不明なコマンド: /{other}")),
    }
}

fn print_selectors() {
    eprintln!("キャンペーン:");
    for c in Campaign::ALL {
        eprintln!("  {}. {} {}", c.number(), c.icon(), c.label());
    }
    eprintln!("お客様タイプ:");
    for m in Mood::ALL {
        eprintln!("  {}. {}", m.number(), m.label());
    }
}

/// Run the REPL until EOF or `/quit`.
pub async fn run(mut driver: SessionDriver) {
    eprintln!("{HELP}\n");
    print_selectors();
    println!("\n{}", driver.view().render_text());
    if !driver.controls().has_credential() {
        eprintln!("⚠️  GEMINI_API_KEY が未設定です。お客様を呼ぶには API キーが必要です。");
    }

    let reader = BufReader::new(tokio::io::stdin());
    let mut lines = reader.lines();
    eprint!("> ");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line.trim().to_string(),
            Ok(None) => break, // EOF
            Err(e) => {
                error!("Error reading stdin: {}", e);
                break;
            }
        };
        if line.is_empty() {
            eprint!("> ");
            continue;
        }

        match parse_line(&line) {
            CliInput::Quit => break,
            CliInput::Help => eprintln!("{HELP}"),
            CliInput::Invalid(msg) => eprintln!("❌ {msg}"),
            CliInput::View => println!("\n{}", driver.view().render_text()),
            CliInput::ListModels => {
                let listing = driver.controls().listing();
                let current = driver.controls().model();
                for m in &listing.models {
                    let mark = if Some(m.as_str()) == current { "*" } else { " " };
                    eprintln!(" {mark} {m}");
                }
                if !listing.fetched {
                    eprintln!("   (既定のモデル一覧)");
                }
            }
            CliInput::Run(command) => {
                if let Some(busy) = command.busy_message() {
                    eprintln!("⏳ {busy}");
                }
                match driver.handle(command).await {
                    Ok(()) => println!("\n{}", driver.view().render_text()),
                    Err(e) => {
                        eprintln!("❌ {e}");
                        if let Some(hint) = e.user_hint() {
                            eprintln!("   {hint}");
                        }
                    }
                }
            }
        }
        eprint!("> ");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_turn() {
        assert!(matches!(
            parse_line("いらっしゃいませ"),
            CliInput::Run(Command::Say(t)) if t == "いらっしゃいませ"
        ));
    }

    #[test]
    fn parses_commands() {
        assert!(matches!(parse_line("/call"), CliInput::Run(Command::CallCustomer)));
        assert!(matches!(parse_line("/start"), CliInput::Run(Command::StartServing)));
        assert!(matches!(parse_line("/reset"), CliInput::Run(Command::Reset)));
        assert!(matches!(parse_line("/quit"), CliInput::Quit));
        assert!(matches!(
            parse_line("/campaign 4"),
            CliInput::Run(Command::SelectCampaign(Campaign::HomeInternet))
        ));
        assert!(matches!(
            parse_line("/mood angry"),
            CliInput::Run(Command::SelectMood(Mood::Angry))
        ));
        assert!(matches!(
            parse_line("/model  gemini-pro "),
            CliInput::Run(Command::Configure { api_key: None, model: Some(m) }) if m == "gemini-pro"
        ));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(matches!(parse_line("/campaign 9"), CliInput::Invalid(_)));
        assert!(matches!(parse_line("/model"), CliInput::Invalid(_)));
        assert!(matches!(parse_line("/dance"), CliInput::Invalid(_)));
    }
}
