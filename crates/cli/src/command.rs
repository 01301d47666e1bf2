// Terminal commands

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Play the current file again, or continue it if paused
    Play,
    Pause,
    Resume,
    Stop,
    Open(PathBuf),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    MissingPath,
    Unknown(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty command"),
            ParseError::MissingPath => write!(f, "usage: o <file>"),
            ParseError::Unknown(cmd) => write!(f, "unknown command '{}', try 'h'", cmd),
        }
    }
}

impl std::error::Error for ParseError {}

impl std::str::FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        match word {
            "" => Err(ParseError::Empty),
            "l" | "play" => Ok(Command::Play),
            "p" | "pause" => Ok(Command::Pause),
            "r" | "resume" => Ok(Command::Resume),
            "s" | "stop" => Ok(Command::Stop),
            "i" | "status" => Ok(Command::Status),
            "h" | "help" | "?" => Ok(Command::Help),
            "q" | "quit" | "exit" => Ok(Command::Quit),
            "o" | "open" => {
                if rest.is_empty() {
                    Err(ParseError::MissingPath)
                } else {
                    Ok(Command::Open(PathBuf::from(rest)))
                }
            }
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

pub const HELP: &str = "\
commands:
  l          play the current file again
  p          pause
  r          resume
  s          stop
  o <file>   open and play another file
  i          show status
  q          quit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_letter_commands() {
        assert_eq!("p".parse(), Ok(Command::Pause));
        assert_eq!(" r ".parse(), Ok(Command::Resume));
        assert_eq!("stop".parse(), Ok(Command::Stop));
        assert_eq!("q".parse(), Ok(Command::Quit));
        assert_eq!("l".parse(), Ok(Command::Play));
        assert_eq!("play".parse(), Ok(Command::Play));
    }

    #[test]
    fn test_open_keeps_spaces_in_path() {
        assert_eq!(
            "o  /music/My Song.wav ".parse(),
            Ok(Command::Open(PathBuf::from("/music/My Song.wav")))
        );
        assert_eq!("o".parse::<Command>(), Err(ParseError::MissingPath));
    }

    #[test]
    fn test_rejects_unknown_and_empty() {
        assert_eq!("".parse::<Command>(), Err(ParseError::Empty));
        assert_eq!(
            "x".parse::<Command>(),
            Err(ParseError::Unknown("x".to_string()))
        );
    }
}
