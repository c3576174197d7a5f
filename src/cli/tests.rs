use super::*;

fn parse_args(argv: &[&str]) -> Args {
    Args::try_parse_from(argv)
        .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
}

#[test]
fn no_subcommand_defaults_to_chat() {
    let args = parse_args(&["flowtalk"]);
    assert!(args.command.is_none());
    assert!(args.log_file.is_none());
}

#[test]
fn say_collects_prompt_words_and_tweaks() {
    let argv = [
        "flowtalk",
        "say",
        "--flow",
        "support",
        "--tweak",
        "ChatModel-1.temperature=0.2",
        "-t",
        "ChatModel-1.model_name=small",
        "--no-stream",
        "what",
        "is",
        "up",
    ];
    match parse_args(&argv).command {
        Some(Commands::Say { run, prompt }) => {
            assert_eq!(run.flow.as_deref(), Some("support"));
            assert_eq!(
                run.tweaks,
                vec![
                    "ChatModel-1.temperature=0.2".to_string(),
                    "ChatModel-1.model_name=small".to_string()
                ]
            );
            assert!(run.no_stream);
            assert_eq!(prompt, vec!["what", "is", "up"]);
        }
        _ => panic!("expected say for argv={argv:?}"),
    }
}

#[test]
fn say_requires_a_prompt() {
    assert!(Args::try_parse_from(["flowtalk", "say"]).is_err());
}

#[test]
fn global_log_options_parse_after_subcommand() {
    let args = parse_args(&[
        "flowtalk",
        "chat",
        "--log-file",
        "debug.log",
        "--transcript",
        "chat.txt",
    ]);
    assert_eq!(args.log_file, Some(PathBuf::from("debug.log")));
    assert_eq!(args.transcript, Some(PathBuf::from("chat.txt")));
    assert!(matches!(args.command, Some(Commands::Chat { .. })));
}

#[test]
fn set_joins_multi_word_values() {
    match parse_args(&["flowtalk", "set", "default-flow", "my", "flow"]).command {
        Some(Commands::Set { key, value }) => {
            assert_eq!(key, "default-flow");
            assert_eq!(value.join(" "), "my flow");
        }
        _ => panic!("expected set"),
    }
}

#[test]
fn flows_accepts_optional_flow_id() {
    assert!(matches!(
        parse_args(&["flowtalk", "flows"]).command,
        Some(Commands::Flows { flow: None })
    ));
    assert!(matches!(
        parse_args(&["flowtalk", "flows", "support"]).command,
        Some(Commands::Flows { flow: Some(ref f) }) if f == "support"
    ));
}
