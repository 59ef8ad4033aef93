use anyhow::{bail, Context};

/// Where typed text goes and what `/focus` points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Main,
    /// 1-based position in the `/tree` listing.
    Branch(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Open(String),
    Child(String),
    Focus(Target),
    Merge(Option<usize>),
    Close(Option<usize>),
    /// Edit the main-log message at a 1-based position.
    Edit { message: usize, text: String },
    DeleteNote(usize),
    Tree,
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
Type text to send it to the focused conversation.

  /open <text>          open a branch anchored on <text> and focus it
  /child <text>         open a nested branch under the focused branch
  /focus main|<n>       focus the main conversation or branch <n>
  /merge [n]            summarize branch <n> (default: focused) into its parent
  /close [n]            discard branch <n> (default: focused)
  /edit <m> <text>      rewrite main message <m> and regenerate from there
  /delnote <m>          delete the note at main message <m>
  /tree                 list open branches
  /show                 print the focused conversation
  /help                 this text
  /quit                 leave";

fn index(value: &str, what: &str) -> anyhow::Result<usize> {
    let index: usize = value
        .parse()
        .with_context(|| format!("{what} must be a number, got '{value}'"))?;
    if index == 0 {
        bail!("{what} numbers start at 1");
    }
    Ok(index)
}

fn optional_index(rest: &str, what: &str) -> anyhow::Result<Option<usize>> {
    if rest.is_empty() {
        Ok(None)
    } else {
        index(rest, what).map(Some)
    }
}

fn required_text(rest: &str, usage: &str) -> anyhow::Result<String> {
    if rest.is_empty() {
        bail!("usage: {usage}");
    }
    Ok(rest.to_string())
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> anyhow::Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(Some(Command::Say(line.to_string())));
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));

    let parsed = match name {
        "open" => Command::Open(required_text(rest, "/open <text>")?),
        "child" => Command::Child(required_text(rest, "/child <text>")?),
        "focus" => match rest {
            "main" | "" => Command::Focus(Target::Main),
            n => Command::Focus(Target::Branch(index(n, "branch")?)),
        },
        "merge" => Command::Merge(optional_index(rest, "branch")?),
        "close" => Command::Close(optional_index(rest, "branch")?),
        "edit" => {
            let Some((message, text)) = rest.split_once(char::is_whitespace) else {
                bail!("usage: /edit <m> <text>");
            };
            Command::Edit {
                message: index(message, "message")?,
                text: text.trim().to_string(),
            }
        }
        "delnote" => Command::DeleteNote(index(rest, "message")?),
        "tree" => Command::Tree,
        "show" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("unknown command '/{other}', try /help"),
    };
    Ok(Some(parsed))
}
