//! Interactive chat loop.
//!
//! Reads lines from stdin and drives a `ChatWidget`. Stdin and widget events
//! (reply timers, simulated voice capture) are multiplexed with
//! `tokio::select!`, and everything the widget broadcasts is echoed.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use legalhelp_chat::{ChatError, ChatWidget, EventOutcome, WidgetEvent};
use legalhelp_core::events::ChatEvent;
use legalhelp_core::types::{Author, LanguageCode, Message, SessionMode};
use legalhelp_speech::{CaptureApplied, CaptureStart, ScriptHandle};

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Open,
    Lang(String),
    ChangeLanguage,
    Mic(String),
    MicFail,
    Clear,
    Close,
    History,
    Status,
    Help,
    Quit,
    Say(String),
    SendDraft,
    Unknown(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplCommand::SendDraft;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return ReplCommand::Say(line.to_string());
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match name {
            "open" => ReplCommand::Open,
            "lang" => ReplCommand::Lang(arg.to_string()),
            "change-language" => ReplCommand::ChangeLanguage,
            "mic" => ReplCommand::Mic(arg.to_string()),
            "mic-fail" => ReplCommand::MicFail,
            "clear" => ReplCommand::Clear,
            "close" => ReplCommand::Close,
            "history" => ReplCommand::History,
            "status" => ReplCommand::Status,
            "help" => ReplCommand::Help,
            "quit" | "exit" => ReplCommand::Quit,
            other => ReplCommand::Unknown(other.to_string()),
        }
    }
}

const HELP: &str = "\
Commands:
  /open                 open the chat widget
  /lang <code>          pick a language (see `legalhelp languages`)
  /change-language      return to the language picker
  /mic <words>          simulate speaking <words> into the microphone
  /mic-fail             simulate a failed recognition
  /clear                clear the conversation
  /close                clear the conversation and close the widget
  /history              print the conversation
  /status               print the widget state
  /quit                 exit
An empty line sends the draft; any other line is sent as a message.";

enum Input {
    Line(Option<String>),
    Event(WidgetEvent),
}

/// Terminal session around a widget.
pub struct Repl {
    widget: ChatWidget,
    events: broadcast::Receiver<ChatEvent>,
    script: Option<ScriptHandle>,
}

impl Repl {
    pub fn new(widget: ChatWidget, script: Option<ScriptHandle>) -> Self {
        let events = widget.subscribe();
        Self {
            widget,
            events,
            script,
        }
    }

    pub async fn run(mut self) -> std::io::Result<()> {
        println!("LegalHelp chat. Type /help for commands.");
        self.execute(ReplCommand::Open);
        self.echo_events();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let input = tokio::select! {
                line = lines.next_line() => Input::Line(line?),
                Some(event) = self.widget.next_event() => Input::Event(event),
            };
            match input {
                Input::Line(None) => break,
                Input::Line(Some(line)) => match ReplCommand::parse(&line) {
                    ReplCommand::Quit => break,
                    command => self.execute(command),
                },
                Input::Event(event) => match self.widget.handle_event(event) {
                    EventOutcome::Capture(CaptureApplied::Transcript) => {
                        println!("(heard; draft is now: {})", self.widget.draft());
                        println!("(press enter on an empty line to send it)");
                    }
                    EventOutcome::Capture(CaptureApplied::Error(reason)) => {
                        println!("(voice input failed: {})", reason);
                    }
                    _ => {}
                },
            }
            self.echo_events();
        }

        self.widget.shutdown();
        self.echo_events();
        Ok(())
    }

    fn execute(&mut self, command: ReplCommand) {
        let result = match command {
            ReplCommand::Open => {
                self.widget.open();
                Ok(())
            }
            ReplCommand::Lang(code) => self.widget.select_language(&code).map(|_| ()),
            ReplCommand::ChangeLanguage => self.widget.change_language(),
            ReplCommand::Mic(words) => self.mic(|script| script.push_transcript(words)),
            ReplCommand::MicFail => self.mic(|script| script.push_error("no-speech")),
            ReplCommand::Clear => {
                self.widget.clear_chat();
                Ok(())
            }
            ReplCommand::Close => {
                self.widget.clear_and_close();
                Ok(())
            }
            ReplCommand::History => {
                print_history(self.widget.messages());
                Ok(())
            }
            ReplCommand::Status => {
                self.print_status();
                Ok(())
            }
            ReplCommand::Help => {
                println!("{}", HELP);
                Ok(())
            }
            ReplCommand::Say(text) => self.widget.send(&text).map(|_| ()),
            ReplCommand::SendDraft => self.widget.send_draft().map(|_| ()),
            ReplCommand::Unknown(name) => {
                println!("unknown command /{}; try /help", name);
                Ok(())
            }
            ReplCommand::Quit => Ok(()),
        };
        if let Err(e) = result {
            print_rejection(&e);
        }
    }

    /// Queue what the simulated microphone will hear, then start capture.
    fn mic(&mut self, queue: impl FnOnce(&ScriptHandle)) -> Result<(), ChatError> {
        let Some(script) = self.script.as_ref() else {
            println!("(voice input is disabled)");
            return Ok(());
        };
        if self.widget.mode() != SessionMode::Conversing {
            return Err(ChatError::InvalidTransition {
                operation: "start_capture",
                mode: self.widget.mode(),
            });
        }
        if self.widget.is_listening() {
            println!("(already listening)");
            return Ok(());
        }
        queue(script);
        match self.widget.start_capture()? {
            CaptureStart::Started(_) | CaptureStart::AlreadyListening => Ok(()),
            CaptureStart::Unsupported => Err(ChatError::UnsupportedCapability),
            CaptureStart::Failed(reason) => Err(ChatError::Capture(reason)),
        }
    }

    fn print_status(&self) {
        let view = self.widget.view();
        println!(
            "mode: {} | language: {} | messages: {} | listening: {} | pending replies: {}",
            view.mode,
            view.language_label.unwrap_or("-"),
            view.messages.len(),
            view.listening,
            view.pending_replies
        );
        if !view.draft.is_empty() {
            println!("draft: {}", view.draft);
        }
    }

    fn echo_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                ChatEvent::ModeChanged { to, .. } => match to {
                    SessionMode::SelectingLanguage => print_languages(),
                    SessionMode::Conversing => println!("(conversation open)"),
                    SessionMode::Closed => println!("(widget closed)"),
                },
                ChatEvent::MessageAppended { message } if message.author == Author::Bot => {
                    print_message(&message);
                }
                ChatEvent::LanguageSelected { language } => {
                    println!("(language: {})", language.label());
                }
                ChatEvent::HistoryCleared => println!("(conversation cleared)"),
                ChatEvent::ListeningChanged { listening: true } => println!("(listening...)"),
                other => tracing::trace!(kind = other.kind(), "Widget event"),
            }
        }
    }
}

fn print_rejection(err: &ChatError) {
    match err {
        ChatError::EmptySubmission => {}
        ChatError::InvalidTransition { mode, .. } => match mode {
            SessionMode::Closed => println!("(the widget is closed; /open it first)"),
            SessionMode::SelectingLanguage => println!("(pick a language first with /lang <code>)"),
            SessionMode::Conversing => println!("(already in the conversation)"),
        },
        other => println!("error: {}", other),
    }
}

fn print_message(message: &Message) {
    let who = match message.author {
        Author::User => "you",
        Author::Bot => "legalhelp",
    };
    println!(
        "[{}] {}: {}",
        message.timestamp.to_datetime().format("%H:%M:%S"),
        who,
        message.text
    );
}

pub fn print_history(messages: &[Message]) {
    if messages.is_empty() {
        println!("(no messages)");
        return;
    }
    for message in messages {
        print_message(message);
    }
}

pub fn print_languages() {
    println!("Choose a language with /lang <code>:");
    for language in LanguageCode::ALL {
        println!("  {}  {}", language.code(), language.label());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use legalhelp_core::config::ChatConfig;
    use legalhelp_storage::{MemoryStore, PersistenceStore};

    fn repl() -> Repl {
        let store = PersistenceStore::new(Arc::new(MemoryStore::new()));
        Repl::new(ChatWidget::new(store, None, &ChatConfig::default()), None)
    }

    #[test]
    fn test_parse_plain_line_is_message() {
        assert_eq!(
            ReplCommand::parse("  Can I get bail? "),
            ReplCommand::Say("Can I get bail?".to_string())
        );
        assert_eq!(ReplCommand::parse("   "), ReplCommand::SendDraft);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ReplCommand::parse("/open"), ReplCommand::Open);
        assert_eq!(
            ReplCommand::parse("/lang hi"),
            ReplCommand::Lang("hi".to_string())
        );
        assert_eq!(
            ReplCommand::parse("/change-language"),
            ReplCommand::ChangeLanguage
        );
        assert_eq!(
            ReplCommand::parse("/mic  mujhe   madad chahiye "),
            ReplCommand::Mic("mujhe   madad chahiye".to_string())
        );
        assert_eq!(ReplCommand::parse("/mic-fail"), ReplCommand::MicFail);
        assert_eq!(ReplCommand::parse("/clear"), ReplCommand::Clear);
        assert_eq!(ReplCommand::parse("/close"), ReplCommand::Close);
        assert_eq!(ReplCommand::parse("/history"), ReplCommand::History);
        assert_eq!(ReplCommand::parse("/status"), ReplCommand::Status);
        assert_eq!(ReplCommand::parse("/exit"), ReplCommand::Quit);
    }

    #[test]
    fn test_parse_lang_without_code() {
        assert_eq!(
            ReplCommand::parse("/lang"),
            ReplCommand::Lang(String::new())
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(
            ReplCommand::parse("/frobnicate now"),
            ReplCommand::Unknown("frobnicate".to_string())
        );
    }

    #[test]
    fn test_rejected_line_keeps_existing_draft() {
        let mut repl = repl();
        repl.execute(ReplCommand::Open);
        assert_eq!(repl.widget.mode(), SessionMode::SelectingLanguage);
        repl.widget.set_draft("spoken words");

        repl.execute(ReplCommand::Say("typed words".to_string()));
        assert_eq!(repl.widget.draft(), "spoken words");
        assert!(repl.widget.messages().is_empty());
    }

    #[tokio::test]
    async fn test_typed_line_is_sent_without_touching_draft() {
        let mut repl = repl();
        repl.execute(ReplCommand::Open);
        repl.execute(ReplCommand::Lang("en".to_string()));
        repl.widget.set_draft("spoken words");

        repl.execute(ReplCommand::Say("typed words".to_string()));
        assert_eq!(repl.widget.messages().len(), 1);
        assert_eq!(repl.widget.messages()[0].text, "typed words");
        assert_eq!(repl.widget.draft(), "spoken words");

        repl.execute(ReplCommand::SendDraft);
        assert_eq!(repl.widget.messages()[1].text, "spoken words");
        assert_eq!(repl.widget.draft(), "");
    }
}
